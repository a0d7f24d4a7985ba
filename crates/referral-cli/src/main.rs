//! Host driver for the referral registry.
//!
//! Supplies the two things the core leaves to its environment: an
//! authenticated caller for every state-changing command (here simply taken
//! from `--caller`, this binary is a single-operator tool) and durable
//! storage, kept as one digest-checked JSON snapshot file. Each command loads
//! the store, applies one operation, and rewrites the store; a rejected
//! operation leaves the file untouched and exits non-zero.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use rand::RngCore;

use referral_registry::{
    Address, ReferralRegistry, RegistryError, RegistrySnapshot, ADDRESS_LEN, NO_AFFILIATE,
};

#[derive(Parser)]
#[command(name = "referral-cli", version)]
#[command(about = "Affiliate lifecycle and user attribution over a JSON snapshot store")]
struct Cli {
    /// Path of the registry store file
    #[arg(long, global = true, default_value = "registry.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a fresh registry store
    Init {
        /// Administrator address, fixed for the registry's lifetime
        #[arg(long)]
        admin: Address,
    },
    /// Apply for an affiliate slot (caller becomes the control address)
    Apply {
        #[arg(long)]
        caller: Address,
        /// Display name, fixed at application time
        #[arg(long)]
        name: String,
        /// Affiliate id, unique for the life of the registry
        #[arg(long)]
        id: String,
    },
    /// Activate an applied affiliate (administrator only)
    Verify {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        id: String,
    },
    /// Deactivate a verified affiliate (administrator only)
    Disable {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        id: String,
    },
    /// Rotate the control address of the caller's affiliate
    ChangeAddress {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        new_address: Address,
    },
    /// Retire the caller's affiliate (only while it is disabled)
    Withdraw {
        #[arg(long)]
        caller: Address,
    },
    /// Attribute a user to a verified affiliate
    Refer {
        #[arg(long)]
        user: Address,
        #[arg(long)]
        id: String,
    },
    /// Flag a user as organic (never referred)
    Organic {
        #[arg(long)]
        user: Address,
    },
    /// Print the registry summary and affiliate table
    Show,
    /// Look up one affiliate by id
    Affiliate {
        #[arg(long)]
        id: String,
    },
    /// Look up a user's attribution state
    User {
        #[arg(long)]
        addr: Address,
    },
    /// Print the trailing audit events as JSON lines
    Events {
        /// Number of trailing events to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Recheck the store's state digest
    VerifyStore,
    /// Generate a random address for local experiments
    GenAddress,
}

fn main() {
    let Cli { store, command } = Cli::parse();
    match command {
        Command::Init { admin } => init_cmd(&store, admin),
        Command::Apply { caller, name, id } => mutate(&store, |registry| {
            let index = registry.apply_for_affiliate(caller, &name, &id)?;
            Ok(format!("Applied → {id} (index {index}, pending verification)"))
        }),
        Command::Verify { caller, id } => mutate(&store, |registry| {
            registry.verify_affiliate(caller, &id)?;
            Ok(format!("Verified → {id}"))
        }),
        Command::Disable { caller, id } => mutate(&store, |registry| {
            registry.disable_affiliate(caller, &id)?;
            Ok(format!("Disabled → {id}"))
        }),
        Command::ChangeAddress {
            caller,
            new_address,
        } => mutate(&store, |registry| {
            registry.change_affiliate_address(caller, new_address)?;
            Ok(format!("Address changed → {new_address}"))
        }),
        Command::Withdraw { caller } => mutate(&store, |registry| {
            let index = registry.caller_affiliate_index(caller);
            registry.withdraw_affiliate(caller)?;
            let id = &registry.affiliate_by_index(index).expect("withdrawn slot").id;
            Ok(format!("Withdrawn → {id} (id retired)"))
        }),
        Command::Refer { user, id } => mutate(&store, |registry| {
            registry.register_referred_user(user, &id)?;
            let index = registry.affiliate_index(&id);
            Ok(format!("Referred {user} → {id} (index {index})"))
        }),
        Command::Organic { user } => mutate(&store, |registry| {
            registry.register_organic_user(user)?;
            Ok(format!("Organic → {user}"))
        }),
        Command::Show => show_cmd(&store),
        Command::Affiliate { id } => affiliate_cmd(&store, &id),
        Command::User { addr } => user_cmd(&store, addr),
        Command::Events { limit } => events_cmd(&store, limit),
        Command::VerifyStore => verify_store_cmd(&store),
        Command::GenAddress => gen_address_cmd(),
    }
}

//==================== store plumbing ====================//

fn load_registry(store: &Path) -> ReferralRegistry {
    let bytes = match fs::read(store) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("error: cannot read {}: {err}", store.display());
            process::exit(2);
        }
    };
    let snapshot: RegistrySnapshot = match serde_json::from_slice(&bytes) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            eprintln!("error: malformed store {}: {err}", store.display());
            process::exit(2);
        }
    };
    if !snapshot.verify_digest() {
        eprintln!("error: state digest mismatch in {}", store.display());
        process::exit(2);
    }
    match ReferralRegistry::restore(snapshot) {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("error: cannot restore {}: {err}", store.display());
            process::exit(2);
        }
    }
}

fn save_registry(store: &Path, registry: &ReferralRegistry) {
    let json = serde_json::to_vec_pretty(&registry.snapshot()).expect("snapshot json");
    if let Err(err) = fs::write(store, json) {
        eprintln!("error: cannot write {}: {err}", store.display());
        process::exit(2);
    }
}

/// Load, apply one operation, rewrite. The success message prints only after
/// the store has been rewritten.
fn mutate(store: &Path, op: impl FnOnce(&mut ReferralRegistry) -> Result<String, RegistryError>) {
    let mut registry = load_registry(store);
    match op(&mut registry) {
        Ok(message) => {
            save_registry(store, &registry);
            println!("{message}");
        }
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    }
}

//==================== commands ====================//

fn init_cmd(store: &Path, admin: Address) {
    if store.exists() {
        eprintln!("error: {} already exists", store.display());
        process::exit(2);
    }
    if admin.is_zero() {
        eprintln!("error: admin cannot be the zero address");
        process::exit(2);
    }
    let registry = ReferralRegistry::new(admin);
    save_registry(store, &registry);
    println!("Registry created → {} (admin {admin})", store.display());
}

fn show_cmd(store: &Path) {
    let registry = load_registry(store);
    println!("admin    {}", registry.admin());
    println!("revision {}", registry.revision());
    println!("digest   {}", hex::encode(registry.snapshot().state_digest));
    println!();
    println!("index  enabled  total_ref  id                    addr");
    for (index, affiliate) in registry.affiliates().iter().enumerate() {
        println!(
            "{index:<5}  {:<7}  {:<9}  {:<20}  {}",
            affiliate.enabled, affiliate.total_ref, affiliate.id, affiliate.addr
        );
    }
}

fn affiliate_cmd(store: &Path, id: &str) {
    let registry = load_registry(store);
    let index = registry.affiliate_index(id);
    if index == NO_AFFILIATE {
        eprintln!("error: no affiliate registered under {id}");
        process::exit(2);
    }
    let record = registry.affiliate_by_index(index).expect("mapped index");
    println!("index     {index}");
    println!("id        {}", record.id);
    println!("name      {}", record.name);
    println!("enabled   {}", record.enabled);
    println!("total_ref {}", record.total_ref);
    println!("addr      {}", record.addr);
}

fn user_cmd(store: &Path, addr: Address) {
    let registry = load_registry(store);
    if registry.is_user_organic(addr) {
        println!("{addr}: organic");
    } else {
        let index = registry.user_affiliate_index(addr);
        if index == NO_AFFILIATE {
            println!("{addr}: unattributed");
        } else {
            let record = registry.affiliate_by_index(index).expect("mapped index");
            println!("{addr}: referred by {} (index {index})", record.id);
        }
    }
    println!("affiliate address → {}", registry.get_affiliate_address(addr));
}

fn events_cmd(store: &Path, limit: usize) {
    let registry = load_registry(store);
    let events = registry.events();
    let start = events.len().saturating_sub(limit);
    for event in &events[start..] {
        println!("{}", serde_json::to_string(event).expect("event json"));
    }
}

fn verify_store_cmd(store: &Path) {
    // load_registry already exits 2 on a digest or consistency failure
    let registry = load_registry(store);
    println!(
        "verify-store: OK (state digest matches, revision {})",
        registry.revision()
    );
}

fn gen_address_cmd() {
    let mut bytes = [0u8; ADDRESS_LEN];
    OsRng.fill_bytes(&mut bytes);
    println!("{}", Address::new(bytes));
}
