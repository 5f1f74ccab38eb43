//! A small CLI for exercising the tree engine and exchange coordinator
//! against a durable, on-disk block store.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use block_store::DurableStore;
use clap::{Parser, Subcommand};
use codec::DirEntry;
use exchange::{CoordinatorConfig, ExchangeCoordinator, PoolKind};
use hash_tree::{HashTree, HashTreeConfig};
use signaling::{Envelope, EnvelopeCallback, SignalingBus};
use tree_core::{Cid, Key, LinkType};

#[derive(Parser, Debug)]
#[command(name = "hashtree", about = "Put, get, and verify content in a local hash-tree store")]
struct Cli {
    /// Root directory for the durable block store.
    #[arg(long, default_value = "./hashtree-data")]
    root: PathBuf,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a file or directory tree, printing the resulting CID.
    Put {
        /// Path to a file or directory on the local filesystem.
        path: PathBuf,
        /// Hex-encoded 32-byte key to encrypt every stored node.
        #[arg(long)]
        key: Option<String>,
    },
    /// Fetch a CID and write its plaintext to a path (`-` for stdout).
    Get {
        /// CID as printed by `put`: `<digest-hex>` or `<digest-hex>.<key-hex>`.
        cid: String,
        /// Output path, or `-` for stdout.
        #[arg(long, default_value = "-")]
        out: PathBuf,
    },
    /// Walk every node reachable from a CID and report missing digests.
    Verify {
        /// CID to verify.
        cid: String,
    },
    /// Run the exchange coordinator against this store until interrupted,
    /// logging hellos and periodic stats. No transport is wired up; this
    /// exercises admission, advertising, and cleanup in isolation.
    Serve {
        /// Max connections in the `follows` pool.
        #[arg(long, default_value_t = 50)]
        follows_max: usize,
        /// Max connections in the `other` pool.
        #[arg(long, default_value_t = 50)]
        other_max: usize,
        /// Seconds between logged stats snapshots.
        #[arg(long, default_value_t = 10)]
        stats_interval_secs: u64,
    },
}

fn parse_cid(s: &str) -> Result<Cid, Box<dyn std::error::Error>> {
    let (digest_hex, key_hex) = s.split_once('.').map_or((s, None), |(d, k)| (d, Some(k)));
    let digest = tree_core::Digest::from_hex(digest_hex).ok_or("malformed digest hex")?;
    match key_hex {
        Some(k) => {
            let bytes = hex::decode(k)?;
            let arr: [u8; 32] = bytes.try_into().map_err(|_| "key must be 32 bytes")?;
            Ok(Cid::encrypted(digest, Key(arr)))
        }
        None => Ok(Cid::plain(digest)),
    }
}

fn format_cid(cid: &Cid) -> String {
    match cid.key {
        Some(key) => format!("{}.{}", cid.digest.to_hex(), hex::encode(key.0)),
        None => cid.digest.to_hex(),
    }
}

fn parse_key(s: &str) -> Result<Key, Box<dyn std::error::Error>> {
    let bytes = hex::decode(s)?;
    let arr: [u8; 32] = bytes.try_into().map_err(|_| "key must be 32 bytes")?;
    Ok(Key(arr))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_json_logging();
    let cli = Cli::parse();
    let store = Arc::new(DurableStore::open(&cli.root).await?);
    let tree = HashTree::new(store.clone(), HashTreeConfig::default());

    match cli.cmd {
        Command::Put { path, key } => {
            let key = key.as_deref().map(parse_key).transpose()?;
            let (cid, size) = put_path(&tree, &path, key).await?;
            println!("{} ({} bytes)", format_cid(&cid), size);
        }
        Command::Get { cid, out } => {
            let cid = parse_cid(&cid)?;
            let bytes = tree.read_file(&cid).await?;
            write_output(&out, &bytes)?;
        }
        Command::Verify { cid } => {
            let cid = parse_cid(&cid)?;
            let report = tree.verify_tree(&cid).await?;
            println!("{}", serde_json::to_string_pretty(&verify_report_json(&report))?);
        }
        Command::Serve { follows_max, other_max, stats_interval_secs } => {
            serve(store, follows_max, other_max, stats_interval_secs).await;
        }
    }
    Ok(())
}

/// `Box::pin` because recursing through an `async fn` directly would need
/// an infinitely-sized future.
fn put_path<'a>(
    tree: &'a HashTree<DurableStore>,
    path: &'a Path,
    key: Option<Key>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(Cid, u64), Box<dyn std::error::Error>>> + 'a>> {
    Box::pin(async move {
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.is_dir() {
            let mut entries = Vec::new();
            let mut read_dir = tokio::fs::read_dir(path).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child_path = entry.path();
                let (child_cid, child_size) = put_path(tree, &child_path, key).await?;
                let link_type = if entry.file_type().await?.is_dir() { LinkType::Dir } else { LinkType::Blob };
                entries.push(DirEntry { name, link_type, cid: child_cid, size: child_size });
            }
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            let (cid, _) = tree.put_directory(entries, key).await?;
            Ok((cid, 0))
        } else {
            let bytes = tokio::fs::read(path).await?;
            let (cid, size) = tree.put_file(&bytes, key).await?;
            Ok((cid, size))
        }
    })
}

fn write_output(out: &Path, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    if out == Path::new("-") {
        use std::io::Write;
        std::io::stdout().write_all(bytes)?;
    } else {
        std::fs::write(out, bytes)?;
    }
    Ok(())
}

fn verify_report_json(report: &hash_tree::VerifyReport) -> serde_json::Value {
    let referenced_by: serde_json::Map<String, serde_json::Value> = report
        .referenced_by
        .iter()
        .map(|(digest, parents)| {
            let parent_hexes: Vec<String> = parents.iter().map(tree_core::Digest::to_hex).collect();
            (digest.to_hex(), serde_json::json!(parent_hexes))
        })
        .collect();
    serde_json::json!({
        "valid": report.valid,
        "missing": report.missing.iter().map(tree_core::Digest::to_hex).collect::<Vec<_>>(),
        "referenced_by": referenced_by,
    })
}

/// A signaling bus that only logs; there is no real transport behind it,
/// so nothing ever arrives for `subscribe`'s callback to fire on.
#[derive(Default)]
struct LoggingBus;

#[async_trait]
impl SignalingBus for LoggingBus {
    async fn publish(&self, envelope: Envelope) {
        tracing::info!(kind = ?envelope.kind, peer_id = %envelope.peer_id, "signaling envelope published");
    }

    async fn subscribe(&self, _on_envelope: EnvelopeCallback) {}
}

async fn serve(store: Arc<DurableStore>, follows_max: usize, other_max: usize, stats_interval_secs: u64) {
    let config = CoordinatorConfig {
        follows: exchange::PoolConfig { max_connections: follows_max, ..exchange::PoolConfig::default() },
        other: exchange::PoolConfig { max_connections: other_max, ..exchange::PoolConfig::default() },
        ..CoordinatorConfig::default()
    };
    let coordinator = ExchangeCoordinator::new(
        tree_core::ids::new_connection_id(),
        config,
        peer_session::PeerSessionConfig::default(),
        Box::new(|_identity: &str| PoolKind::Other),
        store,
        Vec::new(),
        Arc::new(LoggingBus::default()),
    );
    tracing::info!("exchange coordinator running, press ctrl-c to stop");
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(stats_interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = coordinator.stats();
                tracing::info!(
                    follows = snapshot.follows_connections,
                    other = snapshot.other_connections,
                    in_flight = snapshot.in_flight_fetches,
                    waiting = snapshot.waiting_for_hash_depth,
                    "coordinator stats"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                coordinator.shutdown();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_then_get_round_trips_a_single_file() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DurableStore::open(dir.path()).await.unwrap());
        let tree = HashTree::new(store, HashTreeConfig::default());
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, b"hello cli").await.unwrap();
        let (cid, size) = put_path(&tree, &file, None).await.unwrap();
        assert_eq!(size, 9);
        assert_eq!(tree.read_file(&cid).await.unwrap(), b"hello cli");
    }

    #[tokio::test]
    async fn put_recurses_into_directories() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DurableStore::open(dir.path()).await.unwrap());
        let tree = HashTree::new(store, HashTreeConfig::default());
        let src = dir.path().join("src");
        tokio::fs::create_dir_all(&src).await.unwrap();
        tokio::fs::write(src.join("one.txt"), b"one").await.unwrap();
        tokio::fs::write(src.join("two.txt"), b"two").await.unwrap();
        let (cid, _) = put_path(&tree, &src, None).await.unwrap();
        let listing = tree.list_directory(&cid).await.unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].name, "one.txt");
        assert_eq!(listing[1].name, "two.txt");
    }

    #[test]
    fn cid_round_trips_through_format_and_parse() {
        let digest = tree_core::Digest::of(b"x");
        let plain = Cid::plain(digest);
        assert_eq!(parse_cid(&format_cid(&plain)).unwrap(), plain);
        let key = Key([7u8; 32]);
        let encrypted = Cid::encrypted(digest, key);
        assert_eq!(parse_cid(&format_cid(&encrypted)).unwrap(), encrypted);
    }
}
