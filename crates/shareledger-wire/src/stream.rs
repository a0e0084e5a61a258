//! Async framing over tokio byte streams.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::{declared_length, encode_frame, LENGTH_PREFIX_SIZE};
use crate::envelope::Envelope;
use crate::error::Result;

/// Read one frame. The payload buffer is only allocated after the prefix
/// passes the size check.
pub async fn read_frame<R>(reader: &mut R, max: usize) -> Result<Envelope>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    reader.read_exact(&mut prefix).await?;
    let declared = declared_length(prefix, max)?;

    let mut payload = vec![0u8; declared];
    reader.read_exact(&mut payload).await?;

    let envelope = Envelope::from_cbor(&payload)?;
    tracing::trace!(kind = envelope.kind(), bytes = declared, "read frame");
    Ok(envelope)
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, envelope: &Envelope, max: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(envelope, max)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    tracing::trace!(kind = envelope.kind(), bytes = frame.len(), "wrote frame");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MAX_MESSAGE_SIZE;
    use crate::error::WireError;
    use shareledger_core::{ChainPosition, Keypair};

    #[tokio::test]
    async fn test_frames_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let position = ChainPosition::genesis(Keypair::from_seed(&[3; 32]).public_key());
        let sent = Envelope::ChainPosition(position);

        let writer = {
            let sent = sent.clone();
            tokio::spawn(async move {
                write_frame(&mut client, &sent, MAX_MESSAGE_SIZE).await.unwrap();
                write_frame(&mut client, &sent, MAX_MESSAGE_SIZE).await.unwrap();
            })
        };

        assert_eq!(read_frame(&mut server, MAX_MESSAGE_SIZE).await.unwrap(), sent);
        assert_eq!(read_frame(&mut server, MAX_MESSAGE_SIZE).await.unwrap(), sent);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_prefix_rejected_before_read() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

        assert!(matches!(
            read_frame(&mut server, MAX_MESSAGE_SIZE).await,
            Err(WireError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_eof_mid_frame_is_io_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&10u32.to_be_bytes()).await.unwrap();
        client.write_all(&[1, 2, 3]).await.unwrap();
        drop(client);

        assert!(matches!(
            read_frame(&mut server, MAX_MESSAGE_SIZE).await,
            Err(WireError::Io(_))
        ));
    }
}
