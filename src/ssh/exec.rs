//! Remote command execution over an exec channel.

use russh::client;
use russh::ChannelMsg;
use serde::Serialize;
use tracing::debug;

use super::client::GatewayHandler;
use super::error::GatewayError;

/// Captured result of one remote command.
///
/// `output` interleaves stdout and stderr in arrival order; `exit_code` is
/// the remote status when the server reported one.
#[derive(Debug, Serialize)]
pub struct CommandOutput {
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<u32>,
}

/// Run `command` on the remote and capture its combined output.
///
/// A nonzero exit status is not an error: the command ran, and the caller
/// gets the status alongside whatever the command printed. Only channel
/// failures reject.
pub async fn run_command(
    handle: &client::Handle<GatewayHandler>,
    command: &str,
) -> Result<CommandOutput, GatewayError> {
    debug!("Executing remote command: {}", command);

    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| GatewayError::Channel(format!("Failed to open exec channel: {e}")))?;

    channel
        .exec(true, command)
        .await
        .map_err(|e| GatewayError::Channel(format!("Failed to start command: {e}")))?;

    let mut output = Vec::new();
    let mut exit_code = None;

    loop {
        let Some(msg) = channel.wait().await else {
            break;
        };
        match msg {
            ChannelMsg::Data { ref data } => {
                output.extend_from_slice(data);
            }
            // ext 1 is stderr
            ChannelMsg::ExtendedData { ref data, ext: 1 } => {
                output.extend_from_slice(data);
            }
            ChannelMsg::ExitStatus { exit_status } => {
                exit_code = Some(exit_status);
            }
            ChannelMsg::Eof | ChannelMsg::Close => {}
            _ => {}
        }
    }

    Ok(CommandOutput {
        output: String::from_utf8_lossy(&output).into_owned(),
        exit_code,
    })
}
