use punchbuggy_types::state::{ApplicationState, PlayerKey, Winner};

use crate::context::AppContext;

pub(crate) fn run_score(
    ctx: &AppContext,
    player: &str,
    correction: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let key: PlayerKey = player.parse()?;
    let delta = if correction { -1 } else { 1 };
    let state = update(ctx, |state| state.score(key, delta))?;
    let p = state.players.get(key);
    println!("{}: {} (streak {})", p.name, p.score, p.streak);
    Ok(())
}

pub(crate) fn run_next_round(ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let mut winner = Winner::T;
    let state = update(ctx, |state| winner = state.next_round())?;
    let closed = state.round.saturating_sub(1);
    match winner {
        Winner::T => println!("Round {closed} tied."),
        Winner::A => println!("{} won round {closed}.", state.players.a.name),
        Winner::B => println!("{} won round {closed}.", state.players.b.name),
    }
    println!("Round {} started.", state.round);
    Ok(())
}

pub(crate) fn run_reset(ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    update(ctx, ApplicationState::reset)?;
    println!("New game started.");
    Ok(())
}

/// Load, change, save and back up the game.
fn update(
    ctx: &AppContext,
    change: impl FnOnce(&mut ApplicationState),
) -> Result<ApplicationState, Box<dyn std::error::Error>> {
    let mut state = ctx.states.load_or_default()?;
    change(&mut state);
    ctx.states.save(&state)?;
    ctx.state_saved("state-change");
    Ok(state)
}
