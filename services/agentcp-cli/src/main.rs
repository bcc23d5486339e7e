// agentcp-cli: a thin demo driver over the `agentcp` SDK facade. Exercises
// create-aid/load-aid/online/session-send/group operations the way a mobile
// binding layer (Android/Flutter) would, without needing one.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use agentcp::{AgentCp, AgentID};
use clap::{Arg, Command};
use serde_json::json;
use tracing::{error, info};

fn cli() -> Command {
    Command::new("agentcp-cli")
        .about("Demo driver for the agentcp SDK")
        .arg(
            Arg::new("config")
                .help("Path to the TOML config file")
                .short('c')
                .long("config")
                .default_value("acp-cli.toml"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("create-aid")
                .about("Generate a new identity and register it with the CA")
                .arg(Arg::new("aid").required(true))
                .arg(Arg::new("password").required(true)),
        )
        .subcommand(
            Command::new("load-aid")
                .about("Load a previously created identity from disk")
                .arg(Arg::new("aid").required(true))
                .arg(Arg::new("password").required(true)),
        )
        .subcommand(
            Command::new("online")
                .about("Load an identity and bring it online")
                .arg(Arg::new("aid").required(true))
                .arg(Arg::new("password").required(true)),
        )
        .subcommand(Command::new("list-aids").about("List identities registered in this process"))
        .subcommand(
            Command::new("send")
                .about("Bring an identity online, create a session, and send one text message")
                .arg(Arg::new("aid").required(true))
                .arg(Arg::new("password").required(true))
                .arg(Arg::new("peer").required(true).help("Peer AID to invite into the session"))
                .arg(Arg::new("text").required(true)),
        )
        .subcommand(
            Command::new("group-send")
                .about("Bring an identity online and send a message into an existing group")
                .arg(Arg::new("aid").required(true))
                .arg(Arg::new("password").required(true))
                .arg(Arg::new("target_aid").required(true).help("AID hosting the group"))
                .arg(Arg::new("group_id").required(true))
                .arg(Arg::new("text").required(true)),
        )
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)))
        .init();
}

async fn build_cp(config_path: &str) -> agentcp::Result<AgentCp> {
    let cfg = config::load_config_from_path(std::path::Path::new(config_path)).map_err(|e| {
        agentcp::Error::new(agentcp::ErrorCode::InvalidArgument, format!("loading config '{config_path}': {e}"))
    })?;

    let cp = AgentCp::new();
    cp.set_base_urls(cfg.ca_base, cfg.ap_base);
    if let Some(storage_path) = cfg.storage_path {
        cp.set_storage_path(PathBuf::from(storage_path));
    }
    cp.initialize()?;
    Ok(cp)
}

async fn bring_online(cp: &AgentCp, aid: &str, password: &str) -> agentcp::Result<Arc<AgentID>> {
    let agent = cp.load_aid(aid, password).await?;
    agent.online().await?;
    info!(aid, "agent online");
    Ok(agent)
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    init_tracing("info");
    info!(version = env!("CARGO_PKG_VERSION"), "agentcp-cli starting");

    let config_path = matches.get_one::<String>("config").expect("config has a default").clone();

    let result = run(&config_path, &matches).await;
    if let Err(e) = result {
        error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

async fn run(config_path: &str, matches: &clap::ArgMatches) -> agentcp::Result<()> {
    match matches.subcommand() {
        Some(("create-aid", sub)) => {
            let cp = build_cp(config_path).await?;
            let aid = sub.get_one::<String>("aid").expect("required").as_str();
            let password = sub.get_one::<String>("password").expect("required").as_str();
            let agent = cp.create_aid(aid, password).await?;
            println!("created {}", agent.get_aid());
            Ok(())
        }
        Some(("load-aid", sub)) => {
            let cp = build_cp(config_path).await?;
            let aid = sub.get_one::<String>("aid").expect("required").as_str();
            let password = sub.get_one::<String>("password").expect("required").as_str();
            let agent = cp.load_aid(aid, password).await?;
            println!("loaded {}", agent.get_aid());
            Ok(())
        }
        Some(("online", sub)) => {
            let cp = build_cp(config_path).await?;
            let aid = sub.get_one::<String>("aid").expect("required").as_str();
            let password = sub.get_one::<String>("password").expect("required").as_str();
            let agent = bring_online(&cp, aid, password).await?;
            println!("{} is online: {}", agent.get_aid(), agent.is_online());
            Ok(())
        }
        Some(("list-aids", _)) => {
            let cp = build_cp(config_path).await?;
            for aid in cp.list_aids() {
                println!("{aid}");
            }
            Ok(())
        }
        Some(("send", sub)) => {
            let cp = build_cp(config_path).await?;
            let aid = sub.get_one::<String>("aid").expect("required").as_str();
            let password = sub.get_one::<String>("password").expect("required").as_str();
            let peer = sub.get_one::<String>("peer").expect("required").clone();
            let text = sub.get_one::<String>("text").expect("required").as_str();

            let agent = bring_online(&cp, aid, password).await?;
            let sessions = agent.session_manager()?;
            let session_id = sessions.create_session(&[peer]).await.map_acp_err_session()?;
            sessions.send_message(&session_id, &[json!({"type": "text", "text": text})]).map_acp_err_session()?;
            println!("sent to session {session_id}");
            Ok(())
        }
        Some(("group-send", sub)) => {
            let cp = build_cp(config_path).await?;
            let aid = sub.get_one::<String>("aid").expect("required").as_str();
            let password = sub.get_one::<String>("password").expect("required").as_str();
            let target_aid = sub.get_one::<String>("target_aid").expect("required").as_str();
            let group_id = sub.get_one::<String>("group_id").expect("required").as_str();
            let text = sub.get_one::<String>("text").expect("required").as_str();

            let agent = bring_online(&cp, aid, password).await?;
            let group_ops = agent.group_operations()?;
            group_ops
                .send_message(target_aid, group_id, text, "text/plain")
                .await
                .map_err(|e| agentcp::error::map_group_err(e, agentcp::ErrorCode::NetworkError))?;
            println!("sent to group {group_id}");
            Ok(())
        }
        _ => unreachable!("subcommand_required(true)"),
    }
}

trait MapSessionErr<T> {
    fn map_acp_err_session(self) -> agentcp::Result<T>;
}

impl<T> MapSessionErr<T> for Result<T, acp_session::SessionError> {
    fn map_acp_err_session(self) -> agentcp::Result<T> {
        self.map_err(|e| agentcp::Error::new(agentcp::ErrorCode::SessionNotFound, e.to_string()))
    }
}
