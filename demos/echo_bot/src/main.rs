//! Echo Bot Demo
//!
//! A small demonstration of the Volga library: one router that logs every
//! incoming message, answers `/ping`, and echoes `/echo <text>` back into
//! the conversation.
//!
//! # Usage
//!
//! ```bash
//! VOLGA_ACCESS_TOKEN=<token> cargo run --package echo-bot
//! ```
//!
//! The token category (account vs group) is detected automatically.

use anyhow::Result;
use tracing::info;
use volga::prelude::*;

fn echo_router() -> Router {
    Router::new("echo")
        // Runs once before polling starts.
        .on_startup(|| async {
            info!("Echo bot is ready");
            Ok(())
        })
        // Wildcard handler: logs every message, never consumes it.
        .on_message(Filter::new(), |ctx| async move {
            info!(
                peer_id = ctx.peer_id(),
                from_id = ctx.from_id(),
                text = ctx.text(),
                "Incoming message"
            );
            Ok(())
        })
        .on_message(Filter::new().text("/ping"), |ctx| async move {
            ctx.answer("Pong!").await?;
            Ok(())
        })
        // Prefix commands need the wildcard filter plus a manual check.
        .on_message(Filter::new(), |ctx| async move {
            if let Some(content) = ctx.text().strip_prefix("/echo ") {
                // Fire-and-forget: the queue worker paces the send.
                ctx.enqueue_answer(content.to_string());
            }
            Ok(())
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut bot = Bot::from_env()?;
    logging::init_from_config(&bot.config().logging);

    bot.register_router(echo_router());
    bot.run_until_ctrl_c().await?;

    Ok(())
}
