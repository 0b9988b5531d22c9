//! Serenity event handler implementation

use std::sync::Arc;

use serenity::all::{
    ChannelId, Command, CommandInteraction, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, CreateQuickModal, GuildId,
    Interaction, Message, ModalInteraction, Ready, ResolvedOption, ResolvedTarget, ResolvedValue,
};
use serenity::async_trait;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};

use crate::access::CommandKind;
use crate::commands::{
    self, BOORU_HELP, BotRunner, CONTEXT_MENU_NAME, Invocation, MODAL_CANCELLED, Reply,
    parse_prefix,
};
use crate::errors::{self, CommandError, log_discord_error};
use crate::health::AppState;

pub struct Handler {
    /// Guilds to register commands in; empty registers globally
    pub guild_ids: Vec<u64>,
    pub command_prefix: String,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        let (health, runner) = {
            let data = ctx.data.read().await;
            (data.get::<AppState>().cloned(), data.get::<BotRunner>().cloned())
        };
        if let Some(health) = health {
            health.set_bot_username(ready.user.name.clone()).await;
        }
        let Some(runner) = runner else {
            error!("Command runner not found in context data");
            return;
        };

        match ctx.http.get_current_application_info().await {
            Ok(app) => {
                if let Some(owner) = &app.owner {
                    runner.access().add_owner(owner.id.get());
                }
                if let Some(team) = &app.team {
                    for member in &team.members {
                        runner.access().add_owner(member.user.id.get());
                    }
                }
            }
            Err(e) => log_discord_error("Failed to fetch application owner", &e),
        }

        register_commands(&ctx, &self.guild_ids).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Skip bot messages
        if msg.author.bot {
            return;
        }
        let Some(parsed) = parse_prefix(&msg.content, &self.command_prefix) else {
            return;
        };
        let Some(runner) = runner(&ctx).await else {
            return;
        };

        let user_id = msg.author.id.get();
        let result = match parsed {
            Ok(Invocation::Help) => Ok(Reply::public(BOORU_HELP)),
            Ok(Invocation::Add { strip_query, links }) => {
                let _typing = msg.channel_id.start_typing(&ctx.http);
                runner
                    .add(user_id, strip_query, links.as_deref().unwrap_or_default())
                    .await
            }
            Ok(Invocation::Bookmarks { limit }) => {
                let _typing = msg.channel_id.start_typing(&ctx.http);
                runner.bookmarks(user_id, limit).await
            }
            Err(e) => Err(e),
        };

        deliver(&ctx, &Responder::Channel(msg.channel_id), false, result).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(cmd) = interaction else {
            return;
        };
        let Some(runner) = runner(&ctx).await else {
            return;
        };

        match cmd.data.name.as_str() {
            CONTEXT_MENU_NAME => context_import(&ctx, &runner, &cmd).await,
            "booru" => booru(&ctx, &runner, &cmd).await,
            "bookmarks" => bookmarks(&ctx, &runner, &cmd).await,
            other => {
                let err = CommandError::NotFound(other.to_string());
                deliver(&ctx, &Responder::Initial(&cmd), true, Err(err)).await;
            }
        }
    }
}

async fn runner(ctx: &Context) -> Option<Arc<BotRunner>> {
    let data = ctx.data.read().await;
    let runner = data.get::<BotRunner>().cloned();
    if runner.is_none() {
        error!("Command runner not found in context data");
    }
    runner
}

async fn register_commands(ctx: &Context, guild_ids: &[u64]) {
    let definitions = commands::definitions();
    if guild_ids.is_empty() {
        match Command::set_global_commands(&ctx.http, definitions).await {
            Ok(registered) => info!("Registered {} global commands", registered.len()),
            Err(e) => log_discord_error("Failed to register global commands", &e),
        }
        return;
    }
    for id in guild_ids {
        let guild = GuildId::new(*id);
        match guild.set_commands(&ctx.http, definitions.clone()).await {
            Ok(registered) => info!("Registered {} commands in guild {}", registered.len(), id),
            Err(e) => log_discord_error(&format!("Failed to register commands in guild {id}"), &e),
        }
    }
}

// ── Interactions ──────────────────────────────────────────────────────────────

async fn context_import(ctx: &Context, runner: &BotRunner, cmd: &CommandInteraction) {
    let result = match cmd.defer_ephemeral(&ctx.http).await {
        Ok(()) => {
            let text = match cmd.data.target() {
                Some(ResolvedTarget::Message(message)) => message.content.clone(),
                _ => String::new(),
            };
            runner.context_import(cmd.user.id.get(), &text).await
        }
        Err(e) => {
            log_discord_error("Failed to defer context menu", &e);
            Err(CommandError::Handled)
        }
    };
    deliver(ctx, &Responder::Deferred(cmd), true, result).await;
}

async fn booru(ctx: &Context, runner: &BotRunner, cmd: &CommandInteraction) {
    let user_id = cmd.user.id.get();
    match booru_invocation(&cmd.data.options()) {
        Invocation::Add {
            strip_query,
            links: Some(links),
        } => {
            let result = match cmd.defer(&ctx.http).await {
                Ok(()) => runner.add(user_id, strip_query, &links).await,
                Err(e) => {
                    log_discord_error("Failed to defer booru add", &e);
                    Err(CommandError::Handled)
                }
            };
            deliver(ctx, &Responder::Deferred(cmd), false, result).await;
        }
        Invocation::Add {
            strip_query,
            links: None,
        } => add_via_modal(ctx, runner, cmd, strip_query).await,
        _ => {
            let reply = Ok(Reply::private(BOORU_HELP));
            deliver(ctx, &Responder::Initial(cmd), true, reply).await;
        }
    }
}

/// `booru add` without links: ask for them in a modal.
async fn add_via_modal(
    ctx: &Context,
    runner: &BotRunner,
    cmd: &CommandInteraction,
    strip_query: bool,
) {
    let user_id = cmd.user.id.get();
    if let Err(e) = runner.authorize(user_id, CommandKind::Add) {
        deliver(ctx, &Responder::Initial(cmd), true, Err(e)).await;
        return;
    }

    let modal = CreateQuickModal::new("Upload to booru")
        .timeout(runner.modal_timeout())
        .paragraph_field("Links");

    match cmd.quick_modal(ctx, modal).await {
        Ok(Some(response)) => {
            let submitted = &response.interaction;
            let result = match submitted.defer(&ctx.http).await {
                Ok(()) => {
                    let links = response.inputs.first().map(String::as_str).unwrap_or_default();
                    runner.add(user_id, strip_query, links).await
                }
                Err(e) => {
                    log_discord_error("Failed to defer modal submission", &e);
                    Err(CommandError::Handled)
                }
            };
            deliver(ctx, &Responder::Modal(submitted), false, result).await;
        }
        // The modal consumed the interaction response; tell the channel instead.
        Ok(None) => {
            debug!(user_id, "Links modal timed out");
            let reply = Ok(Reply::public(MODAL_CANCELLED));
            deliver(ctx, &Responder::Channel(cmd.channel_id), false, reply).await;
        }
        Err(e) => log_discord_error("Failed to show links modal", &e),
    }
}

async fn bookmarks(ctx: &Context, runner: &BotRunner, cmd: &CommandInteraction) {
    let limit = cmd
        .data
        .options()
        .iter()
        .find_map(|option| match (option.name, &option.value) {
            ("limit", ResolvedValue::Integer(n)) => Some(*n),
            _ => None,
        });

    let result = match cmd.defer(&ctx.http).await {
        Ok(()) => runner.bookmarks(cmd.user.id.get(), limit).await,
        Err(e) => {
            log_discord_error("Failed to defer bookmarks", &e);
            Err(CommandError::Handled)
        }
    };
    deliver(ctx, &Responder::Deferred(cmd), false, result).await;
}

fn booru_invocation(options: &[ResolvedOption<'_>]) -> Invocation {
    for option in options {
        if let ("add", ResolvedValue::SubCommand(args)) = (option.name, &option.value) {
            let mut strip_query = true;
            let mut links = None;
            for arg in args {
                match (arg.name, &arg.value) {
                    ("strip_query", ResolvedValue::Boolean(flag)) => strip_query = *flag,
                    ("links", ResolvedValue::String(text)) => links = Some(text.to_string()),
                    _ => {}
                }
            }
            return Invocation::Add {
                strip_query,
                links: links.filter(|l: &String| !l.trim().is_empty()),
            };
        }
    }
    Invocation::Help
}

// ── Delivery ──────────────────────────────────────────────────────────────────

/// Where a reply goes.
enum Responder<'a> {
    /// Interaction not yet responded to.
    Initial(&'a CommandInteraction),
    /// Deferred command interaction.
    Deferred(&'a CommandInteraction),
    /// Deferred modal submission.
    Modal(&'a ModalInteraction),
    /// Channel of a text command.
    Channel(ChannelId),
}

impl Responder<'_> {
    async fn send(&self, ctx: &Context, reply: &Reply) {
        for (i, chunk) in reply.chunks().into_iter().enumerate() {
            let followup = || {
                CreateInteractionResponseFollowup::new()
                    .content(chunk.clone())
                    .ephemeral(reply.ephemeral)
            };
            let sent = match self {
                Self::Initial(cmd) if i == 0 => {
                    let message = CreateInteractionResponseMessage::new()
                        .content(chunk.clone())
                        .ephemeral(reply.ephemeral);
                    cmd.create_response(&ctx.http, CreateInteractionResponse::Message(message))
                        .await
                }
                Self::Initial(cmd) | Self::Deferred(cmd) => {
                    cmd.create_followup(&ctx.http, followup()).await.map(|_| ())
                }
                Self::Modal(modal) => modal.create_followup(&ctx.http, followup()).await.map(|_| ()),
                Self::Channel(channel) => channel.say(&ctx.http, chunk.clone()).await.map(|_| ()),
            };
            if let Err(e) = sent {
                log_discord_error("Failed to send reply", &e);
                return;
            }
        }
    }
}

/// Send the reply, or what the error reporter makes of the failure.
async fn deliver(
    ctx: &Context,
    responder: &Responder<'_>,
    ephemeral: bool,
    result: Result<Reply, CommandError>,
) {
    let reply = match result {
        Ok(reply) => reply,
        Err(err) => {
            match &err {
                CommandError::Invoke { command, source } => {
                    error!(command = *command, error = ?source, "Command failed");
                }
                CommandError::Handled | CommandError::NotFound(_) => {
                    debug!(error = %err, "Command error not reported");
                }
                other => warn!(error = %other, "Command rejected"),
            }
            match errors::report(&err) {
                Some(content) => Reply { content, ephemeral },
                None => return,
            }
        }
    };
    responder.send(ctx, &reply).await;
}
