//! User input → socket, with local echo.

use super::controller::SessionController;
use super::transport::Connector;
use super::TerminalError;

/// Echo `line` into the scrollback, clear the pending input, and send it.
///
/// Blank lines are ignored. The echo happens whatever the session state, so
/// a line typed into a closed session is still visible next to the
/// [`TerminalError::NotConnected`] it produces. Nothing is queued or retried.
pub fn dispatch<C: Connector>(
    controller: &mut SessionController<C>,
    line: &str,
) -> Result<(), TerminalError> {
    if line.trim().is_empty() {
        return Ok(());
    }
    let session = controller.session_mut();
    session.echo(line);
    session.set_input(String::new());
    controller.send(line)
}

/// Dispatch whatever is in the session's input field.
pub fn submit<C: Connector>(controller: &mut SessionController<C>) -> Result<(), TerminalError> {
    let line = controller.session_mut().take_input();
    dispatch(controller, &line)
}
