//! Interactive terminal authentication with cliclack styled prompts.
//!
//! Runs once at startup when the primary session has no persisted
//! credentials. `AUTH_TYPE=pairing-code` skips the prompt and pairs
//! against `BOT_NUMBER` non-interactively.

use crate::state::AppState;
use tracing::{info, warn};
use wagate_core::config::is_valid_phone;
use wagate_session::{qr, AttemptNotice};

pub async fn run_auth_flow(state: &AppState) -> anyhow::Result<()> {
    if state.config.forced_pairing() {
        let number = state.config.bot_number.clone();
        if !is_valid_phone(&number) {
            anyhow::bail!(
                "AUTH_TYPE=pairing-code requires BOT_NUMBER to be 10-15 digits, got '{number}'"
            );
        }
        info!("pairing non-interactively for {number}");
        let code = state.sessions.begin_pairing(&number).await?;
        println!("\nWhatsApp pairing code: {code}");
        println!("Enter it in WhatsApp > Linked Devices > Link with phone number.\n");
        return Ok(());
    }

    if !console::Term::stdout().is_term() {
        info!("no interactive terminal; authenticate via POST /api/qr or /api/pair");
        return Ok(());
    }

    cliclack::intro("wagate — link WhatsApp")?;

    let method: &str = cliclack::select("How do you want to link this bot?")
        .item("qr", "QR code", "Scan with WhatsApp > Linked Devices")
        .item("pair", "Pairing code", "Enter a code on your phone")
        .interact()?;

    match method {
        "pair" => pairing_flow(state).await,
        _ => qr_flow(state).await,
    }
}

/// Show each QR the attempt emits until it is scanned or fails.
async fn qr_flow(state: &AppState) -> anyhow::Result<()> {
    let (_id, mut notices) = state.sessions.begin_qr_stream().await?;

    while let Some(notice) = notices.recv().await {
        match notice {
            AttemptNotice::Qr(payload) => {
                let rendered = qr::qr_terminal(&payload)?;
                println!("\nScan this QR code with WhatsApp (Linked Devices):\n");
                println!("{rendered}\n");
            }
            AttemptNotice::Failed(reason) => {
                cliclack::outro_cancel(format!("Linking failed: {reason}"))?;
                anyhow::bail!("authentication failed: {reason}");
            }
            AttemptNotice::PairingCode(_) => {}
        }
    }

    // The notice stream closes when the attempt hands off to the
    // primary session.
    cliclack::outro("WhatsApp linked")?;
    Ok(())
}

/// Prompt for a phone number, retrying on failure with a QR fallback.
async fn pairing_flow(state: &AppState) -> anyhow::Result<()> {
    loop {
        let number: String = cliclack::input("Phone number (digits only, with country code)")
            .placeholder("254712345678")
            .validate(|input: &String| {
                if is_valid_phone(input) {
                    Ok(())
                } else {
                    Err("Enter 10-15 digits, no + or spaces")
                }
            })
            .interact()?;

        match state.sessions.begin_pairing(&number).await {
            Ok(code) => {
                cliclack::note(
                    "Pairing code",
                    format!("Enter {code} in WhatsApp > Linked Devices > Link with phone number"),
                )?;
                cliclack::outro("Waiting for WhatsApp to confirm the code")?;
                return Ok(());
            }
            Err(e) => {
                warn!("pairing attempt failed: {e}");
                cliclack::log::warning(format!("Pairing failed: {e}"))?;
                let retry: bool = cliclack::confirm("Try another number?").interact()?;
                if !retry {
                    cliclack::log::info("Falling back to QR linking")?;
                    return qr_flow(state).await;
                }
            }
        }
    }
}
