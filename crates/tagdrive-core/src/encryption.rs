//! Chunked authenticated encryption for stored bytes and state snapshots.
//!
//! Data is split into chunks of at most [`CHUNK_SIZE`] bytes, each sealed with AES-256-GCM
//! under a fresh random nonce. A frame on the wire is
//!
//! ```text
//! [flags: u8][ciphertext length: u32 LE][nonce: 12 bytes][ciphertext + tag]
//! ```
//!
//! The chunk sequence number and the flags byte are bound as associated data, so frames
//! cannot be reordered, dropped or spliced from another stream. The last frame carries
//! [`FLAG_FINAL`]; a stream that ends without it is reported as truncated.

use std::io;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Key, Nonce,
};
use bytes::Bytes;
use futures::Stream;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::AppError;

/// Plaintext bytes per frame.
pub const CHUNK_SIZE: usize = 64 * 1024;
pub const FLAG_FINAL: u8 = 0b0000_0001;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + 4 + NONCE_LEN;

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Failed to seal chunk")]
    Seal,

    #[error("Authentication failed for chunk {0}")]
    Authentication(u64),

    #[error("Encrypted stream is truncated")]
    Truncated,

    #[error("Malformed encrypted stream: {0}")]
    Malformed(String),
}

impl From<EncryptionError> for AppError {
    fn from(err: EncryptionError) -> Self {
        AppError::Encryption(err.to_string())
    }
}

/// AES-256-GCM stream cipher keyed from a pass phrase.
#[derive(Clone)]
pub struct StreamCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for StreamCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCipher").finish_non_exhaustive()
    }
}

impl StreamCipher {
    /// Derives the 32-byte key as SHA-256 of the pass phrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn from_key_bytes(key_bytes: &[u8]) -> Result<Self, EncryptionError> {
        if key_bytes.len() != 32 {
            return Err(EncryptionError::InvalidKey(
                "key must be 32 bytes (256 bits)".to_string(),
            ));
        }
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    fn seal_frame(&self, seq: u64, flags: u8, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let aad = associated_data(seq, flags);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| EncryptionError::Seal)?;

        let mut frame = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        frame.push(flags);
        frame.extend_from_slice(&(ciphertext.len() as u32).to_le_bytes());
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&ciphertext);
        Ok(frame)
    }

    fn open_frame(
        &self,
        seq: u64,
        flags: u8,
        nonce: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, EncryptionError> {
        let aad = associated_data(seq, flags);
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| EncryptionError::Authentication(seq))
    }

    /// Encrypts everything `reader` yields into `writer`. Returns the plaintext byte count.
    pub async fn encrypt_stream<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64, EncryptionError>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut total = 0u64;
        let mut seq = 0u64;
        let mut current = read_chunk(reader).await?;

        loop {
            let next = if current.len() == CHUNK_SIZE {
                read_chunk(reader).await?
            } else {
                Vec::new()
            };
            let is_final = next.is_empty();
            let flags = if is_final { FLAG_FINAL } else { 0 };

            let frame = self.seal_frame(seq, flags, &current)?;
            writer.write_all(&frame).await?;
            total += current.len() as u64;
            seq += 1;

            if is_final {
                break;
            }
            current = next;
        }

        writer.flush().await?;
        Ok(total)
    }

    /// Lazily decrypts a framed stream, yielding one plaintext chunk per frame.
    pub fn decrypt_stream<R>(
        &self,
        reader: R,
    ) -> impl Stream<Item = Result<Bytes, EncryptionError>> + Send + 'static
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let state = DecryptState {
            cipher: self.clone(),
            reader,
            seq: 0,
            finished: false,
        };

        futures::stream::try_unfold(state, |mut state| async move {
            if state.finished {
                let mut trailing = [0u8; 1];
                if state.reader.read(&mut trailing).await? != 0 {
                    return Err(EncryptionError::Malformed(
                        "data after final chunk".to_string(),
                    ));
                }
                return Ok(None);
            }

            let mut header = [0u8; HEADER_LEN];
            read_exact_or_truncated(&mut state.reader, &mut header).await?;
            let (flags, len) = parse_header(&header)?;

            let mut ciphertext = vec![0u8; len];
            read_exact_or_truncated(&mut state.reader, &mut ciphertext).await?;

            let plaintext =
                state
                    .cipher
                    .open_frame(state.seq, flags, &header[5..HEADER_LEN], &ciphertext)?;
            state.seq += 1;
            state.finished = flags & FLAG_FINAL != 0;

            Ok(Some((Bytes::from(plaintext), state)))
        })
    }

    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        if plaintext.is_empty() {
            return self.seal_frame(0, FLAG_FINAL, &[]);
        }

        let chunk_count = plaintext.len().div_ceil(CHUNK_SIZE);
        let mut out = Vec::with_capacity(plaintext.len() + chunk_count * (HEADER_LEN + TAG_LEN));
        for (seq, chunk) in plaintext.chunks(CHUNK_SIZE).enumerate() {
            let flags = if seq + 1 == chunk_count { FLAG_FINAL } else { 0 };
            out.extend_from_slice(&self.seal_frame(seq as u64, flags, chunk)?);
        }
        Ok(out)
    }

    pub fn decrypt_bytes(&self, data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let mut out = Vec::with_capacity(data.len());
        let mut rest = data;
        let mut seq = 0u64;

        loop {
            if rest.len() < HEADER_LEN {
                return Err(EncryptionError::Truncated);
            }
            let (flags, len) = parse_header(&rest[..HEADER_LEN])?;
            let body = &rest[HEADER_LEN..];
            if body.len() < len {
                return Err(EncryptionError::Truncated);
            }

            let plaintext = self.open_frame(seq, flags, &rest[5..HEADER_LEN], &body[..len])?;
            out.extend_from_slice(&plaintext);
            rest = &body[len..];
            seq += 1;

            if flags & FLAG_FINAL != 0 {
                break;
            }
        }

        if !rest.is_empty() {
            return Err(EncryptionError::Malformed(
                "data after final chunk".to_string(),
            ));
        }
        Ok(out)
    }
}

struct DecryptState<R> {
    cipher: StreamCipher,
    reader: R,
    seq: u64,
    finished: bool,
}

fn associated_data(seq: u64, flags: u8) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&seq.to_le_bytes());
    aad[8] = flags;
    aad
}

fn parse_header(header: &[u8]) -> Result<(u8, usize), EncryptionError> {
    let flags = header[0];
    if flags & !FLAG_FINAL != 0 {
        return Err(EncryptionError::Malformed(format!(
            "unknown flags {:#04x}",
            flags
        )));
    }

    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if !(TAG_LEN..=CHUNK_SIZE + TAG_LEN).contains(&len) {
        return Err(EncryptionError::Malformed(format!(
            "chunk length {} out of range",
            len
        )));
    }
    Ok((flags, len))
}

/// Fills `buf` unless the reader hits EOF first.
async fn read_chunk<R>(reader: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut filled = 0;
    while filled < CHUNK_SIZE {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

async fn read_exact_or_truncated<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), EncryptionError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(EncryptionError::Truncated),
        Err(e) => Err(EncryptionError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn encrypt(cipher: &StreamCipher, data: &[u8]) -> Vec<u8> {
        let mut reader = data;
        let mut out = Vec::new();
        let written = cipher.encrypt_stream(&mut reader, &mut out).await.unwrap();
        assert_eq!(written, data.len() as u64);
        out
    }

    async fn decrypt(cipher: &StreamCipher, data: Vec<u8>) -> Result<Vec<u8>, EncryptionError> {
        let chunks: Vec<Bytes> = cipher
            .decrypt_stream(std::io::Cursor::new(data))
            .try_collect()
            .await?;
        Ok(chunks.concat())
    }

    #[tokio::test]
    async fn test_stream_round_trip() {
        let cipher = StreamCipher::from_passphrase("p");
        for len in [0, 1, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE * 2 + 17] {
            let data = sample(len);
            let encrypted = encrypt(&cipher, &data).await;
            assert_ne!(encrypted, data);
            assert_eq!(decrypt(&cipher, encrypted).await.unwrap(), data, "len {len}");
        }
    }

    #[tokio::test]
    async fn test_stream_and_bytes_formats_agree() {
        let cipher = StreamCipher::from_passphrase("p");
        let data = sample(CHUNK_SIZE + 5);

        let from_stream = encrypt(&cipher, &data).await;
        assert_eq!(cipher.decrypt_bytes(&from_stream).unwrap(), data);

        let from_bytes = cipher.encrypt_bytes(&data).unwrap();
        assert_eq!(decrypt(&cipher, from_bytes).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_wrong_passphrase_fails_authentication() {
        let data = sample(100);
        let encrypted = encrypt(&StreamCipher::from_passphrase("p"), &data).await;
        let result = decrypt(&StreamCipher::from_passphrase("q"), encrypted).await;
        assert!(matches!(result, Err(EncryptionError::Authentication(0))));
    }

    #[tokio::test]
    async fn test_tampered_chunk_is_rejected() {
        let cipher = StreamCipher::from_passphrase("p");
        let mut encrypted = encrypt(&cipher, &sample(CHUNK_SIZE + 10)).await;
        let second_frame_body = HEADER_LEN + CHUNK_SIZE + TAG_LEN + HEADER_LEN;
        encrypted[second_frame_body] ^= 0xff;

        let result = decrypt(&cipher, encrypted).await;
        assert!(matches!(result, Err(EncryptionError::Authentication(1))));
    }

    #[tokio::test]
    async fn test_missing_final_chunk_is_truncated() {
        let cipher = StreamCipher::from_passphrase("p");
        let mut encrypted = encrypt(&cipher, &sample(CHUNK_SIZE + 10)).await;
        encrypted.truncate(HEADER_LEN + CHUNK_SIZE + TAG_LEN);

        let result = decrypt(&cipher, encrypted.clone()).await;
        assert!(matches!(result, Err(EncryptionError::Truncated)));
        assert!(matches!(
            cipher.decrypt_bytes(&encrypted),
            Err(EncryptionError::Truncated)
        ));
    }

    #[tokio::test]
    async fn test_trailing_data_is_rejected() {
        let cipher = StreamCipher::from_passphrase("p");
        let mut encrypted = encrypt(&cipher, b"hello").await;
        encrypted.push(0);

        let result = decrypt(&cipher, encrypted.clone()).await;
        assert!(matches!(result, Err(EncryptionError::Malformed(_))));
        assert!(matches!(
            cipher.decrypt_bytes(&encrypted),
            Err(EncryptionError::Malformed(_))
        ));
    }

    #[test]
    fn test_oversized_length_is_malformed() {
        let cipher = StreamCipher::from_passphrase("p");
        let mut encrypted = cipher.encrypt_bytes(b"hello").unwrap();
        encrypted[1..5].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            cipher.decrypt_bytes(&encrypted),
            Err(EncryptionError::Malformed(_))
        ));
    }

    #[test]
    fn test_from_key_bytes_requires_32_bytes() {
        assert!(StreamCipher::from_key_bytes(b"short").is_err());
        let cipher = StreamCipher::from_key_bytes(b"01234567890123456789012345678901").unwrap();
        let encrypted = cipher.encrypt_bytes(b"{}").unwrap();
        assert_eq!(cipher.decrypt_bytes(&encrypted).unwrap(), b"{}");
    }
}
