use anyhow::{bail, Result};

use examsentry::exam::mic_check;

/// Ad-hoc harness for the microphone self-test scoring.
///
/// Usage: check_mic_score "<spoken text>" ["<prompt>"]
fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        bail!("usage: check_mic_score \"<spoken text>\" [\"<prompt>\"]");
    }

    let spoken = &args[0];
    let prompt = args
        .get(1)
        .map(String::as_str)
        .unwrap_or(mic_check::CHECK_SENTENCES[0]);

    println!("Prompt: \"{}\"", prompt);
    println!("Spoken: \"{}\"", spoken);

    let score = mic_check::score(prompt, spoken);
    println!("Accuracy: {}%", score);
    println!("{}", if score >= 60 { "✅ Pass" } else { "❌ Fail (need ≥ 60%)" });

    Ok(())
}
