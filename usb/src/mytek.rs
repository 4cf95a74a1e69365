use crate::channel::TransferChannel;
use crate::commands::Request;
use crate::config::CommConfig;
use crate::device::base::Transport;
use crate::error::{InitError, TransportError};
use crate::receiver::{ReceiveContext, ReceiverState, ShutdownFlag};
use log::{debug, error};
use std::sync::Arc;

// Everything needed to talk to the device once communication is up.
pub struct CommRuntime {
    channel: TransferChannel,
    receiver: ReceiveContext,
}

impl CommRuntime {
    pub fn write8(
        &mut self,
        request: Request,
        register: u8,
        value: u8,
    ) -> Result<(), TransportError> {
        self.channel.write8(request, register, value)
    }

    pub fn write16(
        &mut self,
        request: Request,
        register: u8,
        value_low: u8,
        value_high: u8,
    ) -> Result<(), TransportError> {
        self.channel.write16(request, register, value_low, value_high)
    }

    pub fn sequence_id(&self) -> u8 {
        self.channel.sequence_id()
    }

    pub fn receiver_state(&self) -> ReceiverState {
        self.receiver.state()
    }
}

pub struct MytekChip {
    transport: Arc<dyn Transport>,
    config: CommConfig,
    shutdown: ShutdownFlag,
    comm: Option<CommRuntime>,
}

impl MytekChip {
    pub fn new(transport: Arc<dyn Transport>, config: CommConfig) -> Self {
        Self {
            transport,
            config,
            shutdown: ShutdownFlag::new(),
            comm: None,
        }
    }

    pub fn config(&self) -> &CommConfig {
        &self.config
    }

    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Flags the device as going away, the status receiver won't re-arm past this point.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn comm(&mut self) -> Option<&mut CommRuntime> {
        self.comm.as_mut()
    }

    pub fn has_comm(&self) -> bool {
        self.comm.is_some()
    }

    pub fn init_comm(&mut self) -> Result<(), InitError> {
        if self.comm.is_some() {
            return Err(InitError::AlreadyInitialised);
        }

        let receiver = ReceiveContext::arm(
            self.transport.clone(),
            self.shutdown.clone(),
            self.config.endpoint,
            self.config.interval,
            self.config.receiver_buffer_size,
        )
        .inspect_err(|err| error!("cannot create comm data receiver: {}", err))?;

        let channel = TransferChannel::new(
            self.transport.clone(),
            self.config.endpoint,
            self.config.write_timeout,
        );

        debug!("Comm data receiver armed on endpoint {}", self.config.endpoint);
        self.comm = Some(CommRuntime { channel, receiver });
        Ok(())
    }

    /// Kills the status receiver, and waits until it's guaranteed to be idle. This needs to
    /// happen before `destroy_comm`.
    pub fn abort_comm(&mut self) {
        if let Some(comm) = &mut self.comm {
            debug!("Aborting comm data receiver");
            comm.receiver.abort();
        }
    }

    pub fn destroy_comm(&mut self) {
        if let Some(comm) = self.comm.take() {
            if comm.receiver.state() == ReceiverState::Armed {
                debug!("Comm runtime destroyed while the receiver was still armed");
            }
            drop(comm);
        }
    }
}
