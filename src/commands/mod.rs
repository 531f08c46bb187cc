use crate::league::priority::PriorityUpdate;
use crate::league::roles::RoleAssignment;
use crate::league::selection::Selection;
use crate::league::{split_list, LeagueError, Participant, ParticipantId, RoomId};
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use serenity::builder::CreateEmbed;
use serenity::Color;
use std::collections::HashSet;
use tracing::debug;

/// Split the voice channel into two random teams
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn team(ctx: Context<'_>) -> Result<(), Error> {
    let Some((room, roster)) = channel_roster(ctx).await? else {
        return Ok(());
    };

    let teams = match ctx.data().league.team(room, &roster) {
        Ok(teams) => teams,
        Err(e) => return reply_league_error(ctx, e).await,
    };

    let embed = CreateEmbed::new()
        .title("Teams")
        .color(Color::BLUE)
        .field("Team 1", join_names(&teams.team_a), false)
        .field("Team 2", join_names(&teams.team_b), false);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Pick members from the voice channel, skipping whoever was picked last time
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn select(
    ctx: Context<'_>,
    #[description = "How many members to pick"]
    #[min = 1]
    count: u32,
    #[description = "Only pick from the priority list"] use_list: Option<bool>,
) -> Result<(), Error> {
    let Some((room, roster)) = channel_roster(ctx).await? else {
        return Ok(());
    };

    let selection =
        match ctx
            .data()
            .league
            .select(room, &roster, count as usize, use_list.unwrap_or(false))
        {
            Ok(selection) => selection,
            Err(e) => return reply_league_error(ctx, e).await,
        };

    ctx.say(format_selection(&selection)).await?;
    Ok(())
}

/// Assign League of Legends roles to the voice channel members
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn role(
    ctx: Context<'_>,
    #[description = "Member names (partial match, comma separated)"] member_name: Option<String>,
    #[description = "Roles to hand out (comma separated)"] role: Option<String>,
) -> Result<(), Error> {
    let Some((room, roster)) = channel_roster(ctx).await? else {
        return Ok(());
    };

    let target = member_name.as_deref().map(split_list);
    let assignment = match ctx.data().league.assign_roles(
        room,
        &roster,
        role.as_deref(),
        target.as_deref(),
    ) {
        Ok(assignment) => assignment,
        Err(e) => return reply_league_error(ctx, e).await,
    };

    ctx.say(format_roles(&assignment)).await?;
    Ok(())
}

/// Restrict selection to the named members
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn set_list(
    ctx: Context<'_>,
    #[description = "Member names (partial match, comma separated)"] members: String,
) -> Result<(), Error> {
    let queries = split_list(&members);
    if queries.is_empty() {
        ctx.send(
            poise::CreateReply::default()
                .content("Give at least one member name, e.g. `/set_list alice, bob`")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let Some((room, roster)) = channel_roster(ctx).await? else {
        return Ok(());
    };

    match ctx.data().league.set_priority(room, &roster, &queries) {
        Ok(update) => {
            ctx.say(format_priority_update(&update)).await?;
        }
        Err(e) => reply_league_error(ctx, e).await?,
    }
    Ok(())
}

/// Show the priority list
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn show_list(ctx: Context<'_>) -> Result<(), Error> {
    let room = room_id(ctx)?;
    let Some(priority) = ctx.data().league.priority(room) else {
        ctx.say("No priority list is set.").await?;
        return Ok(());
    };

    let roster = fetch_roster(ctx)?;
    ctx.say(format_priority_list(&priority, &roster)).await?;
    Ok(())
}

/// Remove the priority list
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn clear_list(ctx: Context<'_>) -> Result<(), Error> {
    let room = room_id(ctx)?;
    if ctx.data().league.clear_priority(room) {
        ctx.say("Priority list cleared.").await?;
    } else {
        ctx.say("No priority list is set.").await?;
    }
    Ok(())
}

/// Forget who was picked last, so everyone is eligible again
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    let room = room_id(ctx)?;
    ctx.data().league.reset_selection(room);
    ctx.say("Selection history has been reset.").await?;
    Ok(())
}

fn room_id(ctx: Context<'_>) -> Result<RoomId, Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command can only be used in a server")?;
    Ok(RoomId(guild_id.get()))
}

/// Members currently connected to the configured voice channel, read from the
/// gateway cache.
fn fetch_roster(ctx: Context<'_>) -> Result<Vec<Participant>, Error> {
    let channel_name = &ctx.data().settings.voice_channel;
    // GuildRef must not be held across an await
    let guild = ctx.guild().ok_or("Server is not in the cache yet")?;

    let channel_id = guild
        .channels
        .values()
        .find(|c| c.kind == serenity::ChannelType::Voice && c.name == *channel_name)
        .map(|c| c.id);
    let Some(channel_id) = channel_id else {
        debug!(channel = %channel_name, "voice channel not found");
        return Ok(Vec::new());
    };

    let mut roster: Vec<Participant> = guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id))
        .filter_map(|state| {
            let name = state
                .member
                .as_ref()
                .or_else(|| guild.members.get(&state.user_id))
                .map(|member| member.display_name().to_string())?;
            Some(Participant::new(state.user_id.get(), name))
        })
        .collect();
    roster.sort_by_key(|p| p.id);
    Ok(roster)
}

/// Room and roster, or `None` after telling the user the channel is empty.
async fn channel_roster(ctx: Context<'_>) -> Result<Option<(RoomId, Vec<Participant>)>, Error> {
    let room = room_id(ctx)?;
    let roster = fetch_roster(ctx)?;
    if roster.is_empty() {
        ctx.send(
            poise::CreateReply::default()
                .content(format!(
                    "No one is connected to the **{}** voice channel.",
                    ctx.data().settings.voice_channel
                ))
                .ephemeral(true),
        )
        .await?;
        return Ok(None);
    }
    Ok(Some((room, roster)))
}

async fn reply_league_error(ctx: Context<'_>, err: LeagueError) -> Result<(), Error> {
    debug!(command = %ctx.command().name, error = %err, "league error");
    ctx.send(
        poise::CreateReply::default()
            .content(describe_error(&err))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

fn describe_error(err: &LeagueError) -> String {
    match err {
        LeagueError::InvalidArgument(reason) => format!("Invalid input: {}.", reason),
        LeagueError::InsufficientMembers { needed, available } => format!(
            "Not enough members: {} needed, {} in the channel.",
            needed, available
        ),
        LeagueError::UnsupportedSize(n) => format!(
            "Automatic roles work for 1 to 5 members, not {}. Pass the roles explicitly instead.",
            n
        ),
        LeagueError::NoMatch(queries) => {
            format!("Nobody in the channel matches `{}`.", queries.join(", "))
        }
    }
}

fn join_names(members: &[Participant]) -> String {
    if members.is_empty() {
        return "-".to_string();
    }
    members
        .iter()
        .map(|p| p.display_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_selection(selection: &Selection) -> String {
    let mut lines = vec![format!("Selected: {}", join_names(&selection.selected))];
    if selection.reset_occurred {
        lines.push("Everyone had been picked last round, so the rotation started over.".to_string());
    }
    if !selection.excluded.is_empty() {
        lines.push(format!(
            "Not on the priority list: {}",
            join_names(&selection.excluded)
        ));
    }
    if selection.short_by > 0 {
        lines.push(format!(
            "Only {} could be picked from the priority list ({} short).",
            selection.selected.len(),
            selection.short_by
        ));
    }
    lines.join("\n")
}

fn format_roles(assignment: &[RoleAssignment]) -> String {
    assignment
        .iter()
        .map(|a| format!("{}: {}", a.participant, a.role))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_priority_update(update: &PriorityUpdate) -> String {
    let mut response = format!("Priority list: {}", join_names(&update.matched));
    if !update.not_found.is_empty() {
        response.push_str(&format!("\nNot found: {}", update.not_found.join(", ")));
    }
    response
}

fn format_priority_list(priority: &HashSet<ParticipantId>, roster: &[Participant]) -> String {
    let present: Vec<Participant> = roster
        .iter()
        .filter(|p| priority.contains(&p.id))
        .cloned()
        .collect();
    let absent = priority.len() - present.len();

    let mut response = format!("Priority list: {}", join_names(&present));
    if absent > 0 {
        response.push_str(&format!("\n({} listed member(s) not in the channel)", absent));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(names: &[&str]) -> Vec<Participant> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Participant::new(i as u64 + 1, *name))
            .collect()
    }

    #[test]
    fn test_format_selection_notes() {
        let selection = Selection {
            selected: members(&["Alice"]),
            reset_occurred: true,
            excluded: members(&["Bob", "Carol"]),
            short_by: 1,
        };
        let text = format_selection(&selection);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Selected: Alice");
        assert_eq!(lines.len(), 4);
        assert!(lines[2].ends_with("Bob, Carol"));
    }

    #[test]
    fn test_format_plain_selection() {
        let selection = Selection {
            selected: members(&["Alice", "Bob"]),
            ..Default::default()
        };
        assert_eq!(format_selection(&selection), "Selected: Alice, Bob");
    }

    #[test]
    fn test_format_priority_list_counts_absent() {
        let roster = members(&["Alice", "Bob"]);
        let priority = HashSet::from([ParticipantId(1), ParticipantId(9)]);
        assert_eq!(
            format_priority_list(&priority, &roster),
            "Priority list: Alice\n(1 listed member(s) not in the channel)"
        );
    }

    #[test]
    fn test_format_roles() {
        let roster = members(&["Alice", "Bob"]);
        let assignment = vec![
            RoleAssignment {
                participant: roster[0].clone(),
                role: "TOP".to_string(),
            },
            RoleAssignment {
                participant: roster[1].clone(),
                role: "JG".to_string(),
            },
        ];
        assert_eq!(format_roles(&assignment), "Alice: TOP\nBob: JG");
    }

    #[test]
    fn test_describe_no_match() {
        let err = LeagueError::NoMatch(vec!["zed".to_string(), "yas".to_string()]);
        assert_eq!(describe_error(&err), "Nobody in the channel matches `zed, yas`.");
    }
}
