//! Plain-text views of the session for the terminal

use crate::session::Session;
use shared::{EconomySnapshot, GameSnapshot, LobbyInfo, Role};
use std::fmt::Write;

pub fn render_lobby(lobby: &LobbyInfo) -> String {
    let mut out = String::from("Countries:\n");
    for country in &lobby.countries {
        let _ = writeln!(out, "  [{}] {} {}", country.index, country.flag, country.name);
    }
    out
}

fn render_economy(out: &mut String, economy: &EconomySnapshot) {
    let i = &economy.indicators;
    let _ = writeln!(
        out,
        "{} {} | score {} (x{:.2})",
        economy.flag, economy.name, economy.score, economy.score_factor
    );
    let _ = writeln!(
        out,
        "  i={:.4} (eq {:.4})  PIB={:.1}  IS={:.1}  LM={:.1}  P={:.1}  M={:.1}",
        i.interest_rate, i.equilibrium_rate, i.pib, i.is_output, i.lm_output, i.price_level,
        i.money_supply
    );
    if let Some(event) = &economy.event {
        let _ = writeln!(out, "  event: {}", event.name);
    }
}

/// Summary of the whole game as the controller sees it
pub fn render_snapshot(snapshot: &GameSnapshot) -> String {
    let mut out = String::new();
    match &snapshot.round {
        Some(round) => {
            let status = if round.ended { "ended" } else { "running" };
            let _ = write!(out, "Round {} ({})", round.number, status);
            if let Some(seconds) = round.time_remaining {
                let _ = write!(out, ", {}s left", seconds);
            }
            out.push('\n');
            if let Some(event) = &round.global_event {
                let _ = writeln!(out, "Global event: {}", event.name);
            }
            for result in &round.results {
                if let Some(outcome) = &result.outcome {
                    let _ = writeln!(
                        out,
                        "  economy {}: {} (+{})",
                        result.economy, outcome, result.score_gained
                    );
                }
            }
        }
        None if snapshot.started => out.push_str("Game started\n"),
        None => out.push_str("Waiting for the game to start\n"),
    }
    for economy in &snapshot.economies {
        render_economy(&mut out, economy);
    }
    out
}

/// What a seated player needs: their economy, their options and the tally
pub fn render_player_view(session: &Session) -> String {
    let mut out = String::new();
    let (Some(snapshot), Some(index), Some(role)) =
        (&session.snapshot, session.economy, session.role)
    else {
        return render_snapshot_or_waiting(session);
    };

    if let Some(economy) = snapshot.economies.get(index) {
        render_economy(&mut out, economy);
        if let Some(event) = &economy.event {
            if !event.description.is_empty() {
                let _ = writeln!(out, "  {}", event.description);
            }
            let title = match role {
                Role::Bank => "Bank options",
                Role::Government => "Government options",
            };
            let _ = writeln!(out, "{}:", title);
            for (option, text) in session.options().iter().enumerate() {
                let share = session.votes.get(&option).copied().unwrap_or(0.0);
                let _ = writeln!(out, "  [{}] {} ({:.0}%)", option, text, share);
            }
        }
    }
    if let Some(seconds) = session.time_remaining {
        let _ = writeln!(out, "{}s left", seconds);
    }
    out
}

fn render_snapshot_or_waiting(session: &Session) -> String {
    match &session.snapshot {
        Some(snapshot) => render_snapshot(snapshot),
        None => "Waiting for the server...\n".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::CountrySummary;

    #[test]
    fn test_render_lobby() {
        let lobby = LobbyInfo {
            countries: vec![CountrySummary {
                index: 0,
                name: "Colombia".to_string(),
                flag: "CO".to_string(),
            }],
        };
        assert_eq!(render_lobby(&lobby), "Countries:\n  [0] CO Colombia\n");
    }

    #[test]
    fn test_render_waiting() {
        let snapshot = GameSnapshot {
            started: false,
            round: None,
            economies: Vec::new(),
        };
        assert_eq!(render_snapshot(&snapshot), "Waiting for the game to start\n");
        assert_eq!(render_player_view(&Session::new()), "Waiting for the server...\n");
    }
}
