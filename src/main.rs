use anyhow::{bail, Context};
use log::{error, info};
use std::sync::Arc;

use deskclient::about::AboutInfo;
use deskclient::api::{ApiClient, TicketsApi};
use deskclient::i18n::Translations;
use deskclient::notifications::{Badge, NotificationList};
use deskclient::queue_options::OptionTreeEditor;
use deskclient::storage::{JsonFileStore, KeyValueStore, MemoryStore, COMPANY_ID_KEY};
use deskclient::toast::LogToaster;
use deskclient::ClientConfig;

const USAGE: &str = "Usage: deskclient <command>

Commands:
  about               Show backend version information
  queues              List queues
  options <queueId>   Print the chatbot option tree of a queue
  unread              List tickets with unread messages
  --help              Show this help";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("--help");
    if matches!(command, "--help" | "-h" | "help") {
        println!("{USAGE}");
        return Ok(());
    }

    let config = ClientConfig::load()?;
    let translations = Translations::for_locale(&config.locale);
    let api = ApiClient::new(config.clone()).context("Failed to build HTTP client")?;

    let result = match command {
        "about" => about(&api, &translations).await,
        "queues" => queues(&api).await,
        "options" => {
            let queue_id: i64 = args
                .get(2)
                .context("options needs a queue id")?
                .parse()
                .context("queue id must be a number")?;
            options(api, queue_id, translations).await
        }
        "unread" => unread(&api, &config).await,
        other => {
            eprintln!("{USAGE}");
            bail!("Unknown command: {other}");
        }
    };

    if let Err(e) = &result {
        error!("{} failed: {:#}", command, e);
    }
    result
}

async fn about(api: &ApiClient, translations: &Translations) -> anyhow::Result<()> {
    let app_name = api.config().app_name.clone().unwrap_or_default();
    let info = AboutInfo::load(api, translations, &app_name).await;
    println!("{}", info.title);
    println!("{}", info.backend_version);
    Ok(())
}

async fn queues(api: &ApiClient) -> anyhow::Result<()> {
    for queue in api.list_queues().await? {
        println!("{:>5}  {}", queue.id, queue.name);
    }
    Ok(())
}

async fn options(api: ApiClient, queue_id: i64, translations: Translations) -> anyhow::Result<()> {
    let editor = OptionTreeEditor::new(Arc::new(api), queue_id, Arc::new(LogToaster), translations);
    editor.load_roots().await?;

    loop {
        let tree = editor.snapshot().await;
        let collapsed: Vec<_> = tree
            .keys()
            .into_iter()
            .filter(|key| {
                tree.find(*key)
                    .map(|n| n.id.is_some() && !n.children_loaded)
                    .unwrap_or(false)
            })
            .collect();
        if collapsed.is_empty() {
            break;
        }
        for key in collapsed {
            editor.expand(key).await?;
        }
    }

    for row in editor.outline().await {
        let mut line = format!("{}{} - {}", "  ".repeat(row.depth), row.option, row.title);
        if let Some(media) = &row.media_name {
            line.push_str(&format!(" [{media}]"));
        }
        if !row.forward_queue_id.is_empty() {
            line.push_str(&format!(" -> queue {}", row.forward_queue_id));
        }
        if row.exit_chatbot {
            line.push_str(" (exit)");
        }
        println!("{line}");
    }
    Ok(())
}

async fn unread(api: &ApiClient, config: &ClientConfig) -> anyhow::Result<()> {
    let store: Box<dyn KeyValueStore> = match &config.storage_path {
        Some(path) => Box::new(JsonFileStore::open(path)?),
        None => Box::new(MemoryStore::new()),
    };
    if let Some(company_id) = &config.company_id {
        store.set(COMPANY_ID_KEY, company_id)?;
    }
    if let Some(company_id) = store.company_id() {
        info!("Listing unread tickets for company {}", company_id);
    }

    let list = NotificationList::seeded(api.list_unread_tickets().await?);
    for ticket in list.tickets() {
        let contact = ticket.contact.as_ref().map(|c| c.name.as_str()).unwrap_or("");
        println!(
            "{:>6}  {:<24} {:>3}  {}",
            ticket.id,
            contact,
            ticket.unread_messages.unwrap_or_default(),
            ticket.last_message.as_deref().unwrap_or("")
        );
    }

    let badge = Badge::new(list.len(), config.app_name.as_deref().unwrap_or_default());
    println!("{}", badge.title);
    Ok(())
}
