mod commands;
mod config;
mod keepalive;
mod league;

use std::{sync::Arc, time::Duration};

use ::serenity::all::GatewayIntents;
use poise::serenity_prelude as serenity;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::{Config, Settings};
use league::sweep::IdleSweeper;
use league::League;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

// User data, which is stored and accessible in all command invocations
pub struct Data {
    league: League,
    settings: Settings,
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    // Only command errors are customised, the rest go to the default handler
    match error {
        poise::FrameworkError::Setup { error, .. } => panic!("Failed to start bot: {:?}", error),
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!(command = %ctx.command().name, error = %error, "command failed");
            let reply = poise::CreateReply::default()
                .content("Something went wrong while running that command.")
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                warn!(error = %e, "could not report command error");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!(error = %e, "error while handling error");
            }
        }
    }
}

async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    _data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Ready { data_about_bot, .. } = event {
        info!(user = %data_about_bot.user.name, "logged in");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Config { token, settings } = Config::load()?;

    let league = League::new();
    let sweeper = IdleSweeper::new(league.store(), league.clock(), settings.idle_timeout());
    let sweep_handle = sweeper.spawn(settings.sweep_interval());
    keepalive::start_keepalive_server(settings.keepalive_port);

    let options = poise::FrameworkOptions {
        commands: vec![
            commands::team(),
            commands::select(),
            commands::role(),
            commands::set_list(),
            commands::show_list(),
            commands::clear_list(),
            commands::reset(),
        ],
        prefix_options: poise::PrefixFrameworkOptions {
            prefix: Some(settings.prefix.clone()),
            edit_tracker: Some(Arc::new(poise::EditTracker::for_timespan(
                Duration::from_secs(3600),
            ))),
            case_insensitive_commands: true,
            ..Default::default()
        },
        on_error: |error| Box::pin(on_error(error)),
        pre_command: |ctx| {
            Box::pin(async move {
                info!(command = %ctx.command().qualified_name, "executing command");
            })
        },
        post_command: |ctx| {
            Box::pin(async move {
                info!(command = %ctx.command().qualified_name, "executed command");
            })
        },
        event_handler: |ctx, event, framework, data| {
            Box::pin(event_handler(ctx, event, framework, data))
        },
        ..Default::default()
    };

    let framework = poise::Framework::builder()
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                let commands = &framework.options().commands;
                poise::builtins::register_globally(ctx, commands).await?;
                info!(count = commands.len(), "registered commands");

                Ok(Data { league, settings })
            })
        })
        .options(options)
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_VOICE_STATES;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    let result = client.start().await;
    sweep_handle.stop().await;
    result?;
    Ok(())
}
