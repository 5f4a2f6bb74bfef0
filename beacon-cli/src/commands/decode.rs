use anyhow::{Context, Result};
use beacon_core::InboundFrame;
use beacon_core::protocol::decode_frame;
use clap::Args;
use std::io::Read;

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Raw frame text (reads stdin if omitted)
    pub frame: Option<String>,
}

pub fn run(args: DecodeArgs) -> Result<()> {
    let frame = match args.frame {
        Some(frame) => frame,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            buf
        }
    };

    println!("{}", describe(frame.trim())?);
    Ok(())
}

/// Render what the subscriber would do with one frame
fn describe(frame: &str) -> Result<String> {
    match decode_frame(frame).context("Frame would be dropped")? {
        InboundFrame::Notification(payload) => {
            serde_json::to_string_pretty(&payload).context("Failed to serialize payload")
        }
        InboundFrame::Pong => Ok("pong (keepalive response, not delivered)".to_string()),
        InboundFrame::Unrecognized(Some(kind)) => {
            Ok(format!("ignored frame of type \"{}\"", kind))
        }
        InboundFrame::Unrecognized(None) => Ok("ignored frame without a type".to_string()),
    }
}
