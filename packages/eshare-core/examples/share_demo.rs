//! # Share Demo
//!
//! Walks one share from Alice to Bob, first in legacy mode and then again
//! after Bob registers his derived key.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example share_demo
//! ```

use std::sync::Arc;

use eshare_core::crypto::{derivation_message, derive_keypair};
use eshare_core::protocol::claim_message;
use eshare_core::storage::{MemoryBlobStore, MemoryKeyRegistry, MemoryShareStore};
use eshare_core::{ClaimRequest, CreateShare, ShareConfig, ShareService, SharedFile, WalletSigner};

#[tokio::main]
async fn main() -> eshare_core::Result<()> {
    println!("=== eshare Core: Share Demo ===\n");

    let service = ShareService::new(
        Arc::new(MemoryBlobStore::new()),
        Arc::new(MemoryShareStore::new()),
        Arc::new(MemoryKeyRegistry::new()),
        ShareConfig::default(),
    );

    println!("Step 1: Creating wallets...");
    let alice = WalletSigner::generate();
    let bob = WalletSigner::generate();
    println!("  Alice: {}", alice.address());
    println!("  Bob:   {}", bob.address());
    println!();

    let files = vec![
        SharedFile::new("hello.txt", "text/plain", b"Hello Bob!".to_vec()),
        SharedFile::new("data.bin", "application/octet-stream", vec![0xAB; 64]),
    ];

    for round in 1..=2 {
        if round == 2 {
            println!("Step 3: Bob registers his derived key...");
            let signature = bob.sign_message(&derivation_message(&bob.address()))?;
            let keys = derive_keypair(&signature)?;
            service
                .register_public_key(&bob.address().to_string(), &keys.public_key().to_hex())
                .await?;
            println!("  Public key: {}...", &keys.public_key().to_hex()[..20]);
            println!();
        }

        println!("Step {}: Alice sends {} files...", round * 2, files.len());
        let receipt = service
            .create_share(CreateShare {
                sender: alice.address().to_string(),
                recipient: bob.address().to_string(),
                sender_name: Some("alice.eth".into()),
                recipient_name: Some("bob.eth".into()),
                files: files.clone(),
            })
            .await?;
        println!("  Mode: {}", receipt.mode);
        println!("  Link: {}", receipt.share_link);

        let signature = bob.sign_message(&claim_message(&receipt.share_id, &bob.address()))?;
        let claimed = service
            .claim(&ClaimRequest::new(receipt.share_id, bob.address(), signature))
            .await?;

        let derived = derive_keypair(&bob.sign_message(&derivation_message(&bob.address()))?)?;
        let opened = service.fetch_and_open(&claimed, Some(&derived)).await?;

        for file in &opened {
            println!("  [OK] {} ({} bytes, {})", file.name, file.data.len(), file.mime_type);
        }
        if opened == files {
            println!("  [OK] Files match");
        } else {
            println!("  [FAILED] Files differ");
        }
        println!();
    }

    println!("=== Demo Complete ===");
    Ok(())
}
