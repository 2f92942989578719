//! Session - descriptor pair resolution and the top-level run.
//!
//! Resolution happens in two phases. [`SessionConfig::plan`] parses every
//! mode tag and the command without touching the network, so configuration
//! errors surface before any descriptor exists. [`SessionPlan::open`] then
//! constructs the endpoints, input first, under the timeout governor.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::command::Command;
use crate::endpoint::{Endpoint, EndpointSpec, OpenOptions, Side};
use crate::error::{MyncError, Result};
use crate::governor::TimeoutGovernor;
use crate::launcher::{self, ChildStatus};
use crate::relay::{DEFAULT_BUFFER_SIZE, RelayLoop, RelayStats};

/// The resolved {input, output} assignment.
///
/// `None` on a side of `Split` means the process's own stdin/stdout.
#[derive(Debug)]
pub enum DescriptorPair {
    Split {
        input: Option<Endpoint>,
        output: Option<Endpoint>,
    },
    /// One endpoint acting as both input and output
    Shared(Endpoint),
}

impl DescriptorPair {
    /// Own stdin and stdout on both sides
    pub fn stdio() -> Self {
        DescriptorPair::Split {
            input: None,
            output: None,
        }
    }

    pub fn split(input: Option<Endpoint>, output: Option<Endpoint>) -> Self {
        DescriptorPair::Split { input, output }
    }

    pub fn shared(endpoint: Endpoint) -> Self {
        DescriptorPair::Shared(endpoint)
    }

    /// Configured input endpoint, `None` for own stdin
    pub fn input(&self) -> Option<&Endpoint> {
        match self {
            DescriptorPair::Split { input, .. } => input.as_ref(),
            DescriptorPair::Shared(endpoint) => Some(endpoint),
        }
    }

    /// Configured output endpoint, `None` for own stdout
    pub fn output(&self) -> Option<&Endpoint> {
        match self {
            DescriptorPair::Split { output, .. } => output.as_ref(),
            DescriptorPair::Shared(endpoint) => Some(endpoint),
        }
    }

    /// Whether input and output are the same descriptor
    pub fn is_shared(&self) -> bool {
        matches!(self, DescriptorPair::Shared(_))
    }
}

/// Raw session settings, as given on the command line and in the config file
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub input: Option<String>,
    pub output: Option<String>,
    pub both: Option<String>,
    pub command: Option<String>,
    pub timeout_secs: u64,
    pub buffer_size: usize,
    pub ack: [u8; 3],
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            both: None,
            command: None,
            timeout_secs: 0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            ack: crate::endpoint::udp::DEFAULT_ACK,
        }
    }
}

impl SessionConfig {
    /// Parse and validate everything. Acquires no resources.
    pub fn plan(&self) -> Result<SessionPlan> {
        if self.buffer_size == 0 {
            return Err(MyncError::config("buffer size must be greater than zero"));
        }

        let layout = match &self.both {
            Some(_) if self.input.is_some() || self.output.is_some() => {
                return Err(MyncError::config(
                    "bidirectional mode cannot be combined with input or output modes",
                ));
            }
            Some(mode) => Layout::Shared(EndpointSpec::parse_for(mode, Side::Both)?),
            None => Layout::Split {
                input: self
                    .input
                    .as_deref()
                    .map(|mode| EndpointSpec::parse_for(mode, Side::Input))
                    .transpose()?,
                output: self
                    .output
                    .as_deref()
                    .map(|mode| EndpointSpec::parse_for(mode, Side::Output))
                    .transpose()?,
            },
        };

        let command = self.command.as_deref().map(Command::parse).transpose()?;

        Ok(SessionPlan {
            layout,
            command,
            timeout_secs: self.timeout_secs,
            buffer_size: self.buffer_size,
            options: OpenOptions {
                udp_timeout_secs: self.timeout_secs,
                ack: self.ack,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    Split {
        input: Option<EndpointSpec>,
        output: Option<EndpointSpec>,
    },
    Shared(EndpointSpec),
}

/// A validated session, ready to acquire its endpoints
#[derive(Debug, Clone)]
pub struct SessionPlan {
    layout: Layout,
    command: Option<Command>,
    timeout_secs: u64,
    buffer_size: usize,
    options: OpenOptions,
}

impl SessionPlan {
    pub fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Input spec, or the shared spec in bidirectional mode
    pub fn input_spec(&self) -> Option<&EndpointSpec> {
        match &self.layout {
            Layout::Split { input, .. } => input.as_ref(),
            Layout::Shared(spec) => Some(spec),
        }
    }

    /// Output spec, or the shared spec in bidirectional mode
    pub fn output_spec(&self) -> Option<&EndpointSpec> {
        match &self.layout {
            Layout::Split { output, .. } => output.as_ref(),
            Layout::Shared(spec) => Some(spec),
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.layout, Layout::Shared(_))
    }

    /// Governor armed with the session timeout, to be created before any endpoint
    pub fn governor(&self) -> TimeoutGovernor {
        TimeoutGovernor::with_timeout(self.timeout_secs)
    }

    /// Construct the endpoints. If the output fails, the already-open input is closed.
    pub async fn open(self, governor: &TimeoutGovernor) -> Result<Session> {
        let pair = match &self.layout {
            Layout::Shared(spec) => {
                log::info!("Bidirectional mode: {}", spec);
                DescriptorPair::shared(Endpoint::open(spec, governor, &self.options).await?)
            }
            Layout::Split { input, output } => {
                let input = match input {
                    Some(spec) => {
                        log::info!("Input mode: {}", spec);
                        Some(Endpoint::open(spec, governor, &self.options).await?)
                    }
                    None => None,
                };
                let output = match output {
                    Some(spec) => {
                        log::info!("Output mode: {}", spec);
                        Some(Endpoint::open(spec, governor, &self.options).await?)
                    }
                    None => None,
                };
                DescriptorPair::split(input, output)
            }
        };

        Ok(Session {
            pair,
            command: self.command,
            buffer_size: self.buffer_size,
        })
    }
}

/// What a finished session did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The relay loop ran until every source reached end of stream
    Relayed(RelayStats),
    /// A command was launched on the descriptor pair
    Launched(ChildStatus),
}

/// Endpoints acquired, command resolved
#[derive(Debug)]
pub struct Session {
    pair: DescriptorPair,
    command: Option<Command>,
    buffer_size: usize,
}

impl Session {
    pub fn new(pair: DescriptorPair, command: Option<Command>) -> Self {
        Self {
            pair,
            command,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn pair(&self) -> &DescriptorPair {
        &self.pair
    }

    /// Launch the command if there is one, otherwise relay against the process's own stdio
    pub async fn run(self, governor: &TimeoutGovernor) -> Result<Outcome> {
        self.run_with(governor, tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// As [`Session::run`], with explicit streams standing in for own stdin/stdout
    pub async fn run_with<R, W>(self, governor: &TimeoutGovernor, stdin: R, stdout: W) -> Result<Outcome>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        match self.command {
            Some(command) => {
                let status = launcher::launch(&command, self.pair, governor).await?;
                Ok(Outcome::Launched(status))
            }
            None => {
                let relay = RelayLoop::new(&self.pair, stdin, stdout).with_buffer_size(self.buffer_size);
                let stats = governor.guard(relay.run()).await??;
                Ok(Outcome::Relayed(stats))
            }
        }
    }
}

/// Plan, arm the governor, open the endpoints and run
pub async fn run(config: &SessionConfig) -> Result<Outcome> {
    let plan = config.plan()?;
    let governor = plan.governor();
    let session = plan.open(&governor).await?;
    session.run(&governor).await
}
