// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

/// Result of one bounded read.
#[derive(Debug, PartialEq, Eq)]
pub enum Chunk {
	Data(Vec<u8>),
	/// Nothing arrived before the timeout.
	Empty,
	/// End of stream.
	Closed,
}

/// Read at most `max` bytes, giving up after `timeout`.
pub async fn read_chunk<R>(reader: &mut R, max: usize, timeout: Duration) -> std::io::Result<Chunk>
where
	R: AsyncRead + Unpin + ?Sized,
{
	let mut buf = vec![0u8; max.max(1)];
	match tokio::time::timeout(timeout, reader.read(&mut buf)).await {
		Err(_) => Ok(Chunk::Empty),
		Ok(Ok(0)) => Ok(Chunk::Closed),
		Ok(Ok(n)) => {
			buf.truncate(n);
			Ok(Chunk::Data(buf))
		}
		Ok(Err(e)) => Err(e),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::io::AsyncWriteExt;

	#[tokio::test]
	async fn test_reads_up_to_max() {
		let mut reader: &[u8] = b"abcdef";
		let chunk = read_chunk(&mut reader, 4, Duration::from_millis(100))
			.await
			.unwrap();
		assert_eq!(chunk, Chunk::Data(b"abcd".to_vec()));
	}

	#[tokio::test]
	async fn test_eof_is_closed() {
		let mut reader: &[u8] = b"";
		let chunk = read_chunk(&mut reader, 4, Duration::from_millis(100))
			.await
			.unwrap();
		assert_eq!(chunk, Chunk::Closed);
	}

	#[tokio::test(start_paused = true)]
	async fn test_silence_is_empty() {
		let (mut writer, mut reader) = tokio::io::duplex(16);
		let chunk = read_chunk(&mut reader, 4, Duration::from_millis(100))
			.await
			.unwrap();
		assert_eq!(chunk, Chunk::Empty);

		writer.write_all(b"late").await.unwrap();
		let chunk = read_chunk(&mut reader, 4, Duration::from_millis(100))
			.await
			.unwrap();
		assert_eq!(chunk, Chunk::Data(b"late".to_vec()));
	}
}
