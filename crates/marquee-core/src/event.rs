//! Player inbox
//!
//! Every input (user command, sink event, engine event, timer firing)
//! enters the session as an [`Envelope`] and is processed to completion
//! before the next one.

use crate::{
    controls::Command,
    engine::EngineEvent,
    media::MediaEvent,
    timer::TimerId,
    types::AttachmentId,
};
use tokio::sync::mpsc;

/// One unit of input to the session
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Command(Command),
    Media {
        attachment: AttachmentId,
        event: MediaEvent,
    },
    Engine {
        attachment: AttachmentId,
        event: EngineEvent,
    },
    Timer(TimerId),
    /// Stop the driver loop
    Shutdown,
}

impl Envelope {
    pub fn media(attachment: AttachmentId, event: MediaEvent) -> Self {
        Envelope::Media { attachment, event }
    }

    pub fn engine(attachment: AttachmentId, event: EngineEvent) -> Self {
        Envelope::Engine { attachment, event }
    }
}

impl From<Command> for Envelope {
    fn from(command: Command) -> Self {
        Envelope::Command(command)
    }
}

pub type EventSender = mpsc::UnboundedSender<Envelope>;
pub type EventReceiver = mpsc::UnboundedReceiver<Envelope>;

/// Create the session inbox
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
