//! Opening a device and pumping its input into the session.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use denki_core::codec::DeviceProfile;
use denki_core::events::TracingObserver;
use denki_core::session::{DeviceSession, SessionConfig};
use denki_core::state::{AccessState, HandleResult};
use denki_core::transport::{InboundMessage, MidirInput, MidirTransport, PortDirection, PortState};
use tracing::{debug, info};

pub type Session<P> = DeviceSession<P, MidirTransport, TracingObserver>;

/// Open session with its input connection and message stream.
pub struct Device<P: DeviceProfile> {
    pub session: Session<P>,
    input: MidirInput,
    receiver: Receiver<InboundMessage>,
}

impl<P: DeviceProfile> Device<P> {
    /// Open both ports matching the configured pattern and start the session.
    pub fn open(profile: P, config: SessionConfig) -> Result<Self> {
        let pattern = config.port_pattern().to_string();
        let (sender, receiver) = mpsc::channel();

        let transport = MidirTransport::open(&pattern)?;
        let output_name = transport.port_name().to_string();
        let input = MidirInput::open(&pattern, sender)?;

        let mut session = DeviceSession::new(profile, transport, config);
        session.set_access(AccessState::Enabled);
        session.on_port_state(
            PortDirection::Input,
            PortState::Connected,
            Some(input.port_name().to_string()),
        )?;
        session.on_port_state(PortDirection::Output, PortState::Connected, Some(output_name))?;

        Ok(Self {
            session,
            input,
            receiver,
        })
    }

    /// Feed inbound messages until `done` accepts a result or the deadline passes.
    pub fn wait_for(
        &mut self,
        timeout: Duration,
        mut done: impl FnMut(&Session<P>, &HandleResult) -> bool,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let message = match self.receiver.recv_timeout(remaining) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(anyhow!(
                        "Timeout waiting for device after {}ms",
                        timeout.as_millis()
                    ));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("Input port closed"));
                }
            };

            let result = self.session.on_message_from(&message.port, &message.bytes)?;
            debug!(result = ?result, "Handled message");
            if done(&self.session, &result) {
                return Ok(());
            }
        }
    }

    /// Feed inbound messages until the input goes away.
    pub fn run(&mut self) -> Result<()> {
        while let Ok(message) = self.receiver.recv() {
            match self.session.on_message_from(&message.port, &message.bytes)? {
                HandleResult::Ignored => {}
                result => info!(result = ?result, "Device message"),
            }
        }
        Ok(())
    }

    pub fn close(self) {
        self.input.close();
    }
}
