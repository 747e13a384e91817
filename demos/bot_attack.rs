//! Walk a session through human typing, a simulated bot and an injection attempt

use chrono::DateTime;
use zerotrust_pulse::{SimulatedAttack, TrustSession, TypingBaseline};

fn main() {
    let mut session = TrustSession::default();
    session.set_baseline(TypingBaseline::reference());

    let at = match DateTime::parse_from_rfc3339("2024-01-15T14:00:00+01:00") {
        Ok(at) => at,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    let mut now_ms = 0;
    for interval in [190, 210, 205, 180, 220, 195] {
        now_ms += interval;
        if let Err(e) = session.record_keystroke(now_ms) {
            eprintln!("Error: {e}");
            return;
        }
    }

    let human = session.evaluate(at);
    println!("human typing:    {:>3} {} {:?}", human.score, human.level, human.action());

    session.simulate(SimulatedAttack::BotTyping);
    let bot = session.evaluate(at);
    println!("bot typing:      {:>3} {} {:?}", bot.score, bot.level, bot.action());

    session.simulate(SimulatedAttack::ImpossibleTravel);
    let travel = session.evaluate(at);
    println!("plus travel:     {:>3} {} {:?}", travel.score, travel.level, travel.action());

    session.clear_simulations();
    session.screen_credentials("admin' OR '1'='1");
    let injected = session.evaluate(at);
    println!("injection:       {:>3} {} {:?}", injected.score, injected.level, injected.action());
}
