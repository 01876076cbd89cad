//! Session meter: bridges one bandwidth-rental session to two ledger
//! transactions and a block seal.
//!
//! Per-session state machine: AwaitingDeposit -> Streaming -> Closed. A
//! deposit that fails to parse aborts the session before anything is
//! recorded; once the transport signals end-of-stream the usage charge is
//! recorded and exactly one block is sealed.

use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::block::TxKind;
use crate::error::SessionError;
use crate::ledger::Ledger;

/// Width of the fixed, space-padded ASCII deposit field opening a session.
pub const DEPOSIT_FIELD_LEN: usize = 32;

/// Role name the provider records transactions under.
pub const PROVIDER_IDENTITY: &str = "provider";

const RELAY_BUF_LEN: usize = 4096;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// What one completed session amounted to.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub client: String,
    pub deposit: f64,
    pub bytes_metered: u64,
    pub cost: f64,
}

/// Terminate one provider-side session over `stream`.
///
/// Reads the deposit field, records the deposit, echo-relays payload bytes
/// while metering what the client sends, and on end-of-stream records the
/// usage charge and seals a block. The usage-record and seal happen under a
/// single lock acquisition, so concurrent sessions can never interleave
/// inside the seal critical section.
pub async fn run_session<S>(
    mut stream: S,
    client_identity: &str,
    ledger: Arc<Mutex<Ledger>>,
    rate_per_mb: f64,
) -> Result<SessionSummary, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // AwaitingDeposit
    let deposit = read_deposit(&mut stream).await?;
    ledger
        .lock()
        .await
        .record_transaction(client_identity, PROVIDER_IDENTITY, deposit, TxKind::Deposit)?;
    info!("deposit: {} tokens from {}", deposit, client_identity);

    // Streaming: echo relay, metering bytes sent by the initiating peer
    let mut buf = [0u8; RELAY_BUF_LEN];
    let mut bytes_metered: u64 = 0;
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        bytes_metered += n as u64;
        stream.write_all(&buf[..n]).await?;
    }

    // Closed: charge for what was observed and seal, exactly once
    let mb = bytes_metered as f64 / BYTES_PER_MB;
    let cost = mb * rate_per_mb;
    if cost > deposit {
        warn!(
            "usage charge {:.3} exceeds deposit {:.3} from {}",
            cost, deposit, client_identity
        );
    }
    {
        let mut ledger = ledger.lock().await;
        ledger.record_transaction(PROVIDER_IDENTITY, client_identity, cost, TxKind::Usage)?;
        ledger.seal_block()?;
    }
    info!(
        "session end: {:.3} MB used by {}, cost={:.3} tokens",
        mb, client_identity, cost
    );

    Ok(SessionSummary {
        client: client_identity.to_string(),
        deposit,
        bytes_metered,
        cost,
    })
}

/// Parse the fixed-width deposit field. Negative, non-finite and non-numeric
/// input all count as parse failures.
async fn read_deposit<S>(stream: &mut S) -> Result<f64, SessionError>
where
    S: AsyncRead + Unpin,
{
    let mut field = [0u8; DEPOSIT_FIELD_LEN];
    stream.read_exact(&mut field).await?;
    let text = std::str::from_utf8(&field)
        .map_err(|_| SessionError::Deposit(String::from_utf8_lossy(&field).into_owned()))?;
    let trimmed = text.trim();
    let amount: f64 = trimmed
        .parse()
        .map_err(|_| SessionError::Deposit(trimmed.to_string()))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(SessionError::Deposit(trimmed.to_string()));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn test_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("bandnet_session_{}_{}.json", name, std::process::id()))
    }

    fn shared_ledger(path: &PathBuf, difficulty: usize) -> Arc<Mutex<Ledger>> {
        let _ = fs::remove_file(path);
        Arc::new(Mutex::new(Ledger::open(path, difficulty).unwrap()))
    }

    fn deposit_field(text: &str) -> Vec<u8> {
        let mut field = text.as_bytes().to_vec();
        field.resize(DEPOSIT_FIELD_LEN, b' ');
        field
    }

    #[tokio::test]
    async fn test_session_meters_and_seals() {
        let path = test_path("meters");
        let ledger = shared_ledger(&path, 1);

        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(run_session(server, "203.0.113.7", Arc::clone(&ledger), 10.0));

        client.write_all(&deposit_field("100.0")).await.unwrap();

        // stream 2 MiB in relay-sized chunks, draining the echo as we go
        let chunk = [0xabu8; 4096];
        let mut echo = [0u8; 4096];
        for _ in 0..512 {
            client.write_all(&chunk).await.unwrap();
            client.read_exact(&mut echo).await.unwrap();
            assert_eq!(echo, chunk);
        }
        client.shutdown().await.unwrap();

        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.bytes_metered, 2 * 1024 * 1024);
        assert_eq!(summary.cost, 20.0);

        let ledger = ledger.lock().await;
        let block = ledger.last_block();
        assert_eq!(block.index, 1);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].kind, TxKind::Deposit);
        assert_eq!(block.transactions[0].amount, 100.0);
        assert_eq!(block.transactions[1].kind, TxKind::Usage);
        assert_eq!(block.transactions[1].amount, 20.0);
        assert!(ledger.pending().is_empty());

        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_zero_byte_session_still_seals() {
        let path = test_path("zero");
        let ledger = shared_ledger(&path, 1);

        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(run_session(server, "203.0.113.8", Arc::clone(&ledger), 10.0));

        client.write_all(&deposit_field("50")).await.unwrap();
        client.shutdown().await.unwrap();

        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.bytes_metered, 0);
        assert_eq!(summary.cost, 0.0);

        let ledger = ledger.lock().await;
        let block = ledger.last_block();
        assert_eq!(block.index, 1);
        assert_eq!(block.transactions[1].amount, 0.0);

        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_malformed_deposit_records_nothing() {
        let path = test_path("malformed");
        let ledger = shared_ledger(&path, 1);

        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(run_session(server, "203.0.113.9", Arc::clone(&ledger), 10.0));

        client.write_all(&deposit_field("not-a-number")).await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Deposit(_)));

        let ledger = ledger.lock().await;
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.chain().len(), 1); // genesis only

        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_negative_deposit_is_parse_failure() {
        let path = test_path("negative");
        let ledger = shared_ledger(&path, 1);

        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(run_session(server, "203.0.113.10", Arc::clone(&ledger), 10.0));

        client.write_all(&deposit_field("-5.0")).await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Deposit(_)));

        let ledger = ledger.lock().await;
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.chain().len(), 1);

        let _ = fs::remove_file(&path);
    }
}
