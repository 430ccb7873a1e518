// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Boolean coercion for probe results.
///
/// A value is truthy when it is not empty, not zero, not `None` and not
/// `false`. Polling stops at the first truthy probe result.
pub trait Truthy {
	fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
	fn is_truthy(&self) -> bool {
		*self
	}
}

impl<T> Truthy for Option<T> {
	fn is_truthy(&self) -> bool {
		self.is_some()
	}
}

impl<T> Truthy for Vec<T> {
	fn is_truthy(&self) -> bool {
		!self.is_empty()
	}
}

impl<T> Truthy for VecDeque<T> {
	fn is_truthy(&self) -> bool {
		!self.is_empty()
	}
}

impl<K, V, S> Truthy for HashMap<K, V, S> {
	fn is_truthy(&self) -> bool {
		!self.is_empty()
	}
}

impl<K, V> Truthy for BTreeMap<K, V> {
	fn is_truthy(&self) -> bool {
		!self.is_empty()
	}
}

impl<T, S> Truthy for HashSet<T, S> {
	fn is_truthy(&self) -> bool {
		!self.is_empty()
	}
}

impl Truthy for String {
	fn is_truthy(&self) -> bool {
		!self.is_empty()
	}
}

impl Truthy for &str {
	fn is_truthy(&self) -> bool {
		!self.is_empty()
	}
}

macro_rules! impl_truthy_for_int {
	($($t:ty),*) => {
		$(
			impl Truthy for $t {
				fn is_truthy(&self) -> bool {
					*self != 0
				}
			}
		)*
	};
}

impl_truthy_for_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
