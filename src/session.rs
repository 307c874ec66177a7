//! Simulation of a program run as an ideal functionality.
//!
//! Instead of secret sharing, every party hands its inputs to a trusted evaluator, which computes
//! the program in the clear and delivers to each party exactly the outputs bound to it. This is the
//! behavior a real MPC runtime emulates, which makes the session useful to test the routing of
//! inputs and outputs without any cryptography.
//!
//! Parties `0..n` are the parties of the program, in declaration order; the evaluator has index
//! `n`.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{runtime::Builder, task};
use tracing::{Level, debug, info, instrument, warn};

use crate::{
    channel::{self, Channel, SimpleChannel, recv_from, send_to},
    eval::{EvalError, InputValues, PartyOutputs, Value, evaluate},
    program::{PartyId, Program},
};

/// An error that occurred during a simulated session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A message could not be sent or received.
    #[error("channel error: {0}")]
    Channel(#[from] channel::Error),
    /// The program could not be evaluated on the submitted inputs.
    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),
    /// A party submitted inputs for a different program.
    #[error("party {party} runs program {actual}, but the evaluator runs {expected}")]
    ProgramMismatch {
        /// The index of the party.
        party: usize,
        /// The fingerprint of the evaluator's program.
        expected: String,
        /// The fingerprint of the party's program.
        actual: String,
    },
    /// The program fingerprint could not be computed.
    #[error("could not fingerprint the program: {0}")]
    Fingerprint(String),
    /// The evaluator aborted the session and delivered no outputs.
    #[error("the session was aborted: {0}")]
    Aborted(String),
    /// The channel does not connect the expected number of participants.
    #[error("expected {expected} participants, but the channel connects {actual}")]
    WrongParticipants {
        /// Parties of the program plus the evaluator.
        expected: usize,
        /// Participants of the channel.
        actual: usize,
    },
    /// The session settings cannot be used.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
    /// A party task or the async runtime failed.
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Settings of a simulated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a participant waits for a message before giving up.
    pub recv_timeout: Duration,
    /// The number of messages that can be buffered per channel, at least 1.
    pub buffer_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_secs(60),
            buffer_capacity: 16,
        }
    }
}

/// The inputs of one party, as sent to the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Submission {
    fingerprint: String,
    inputs: BTreeMap<String, i64>,
}

/// The evaluator's answer to one party.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Delivery {
    Outputs(Vec<(String, WireValue)>),
    Aborted(String),
}

/// [`Value`] is untagged for JSON, which bincode cannot deserialize.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum WireValue {
    Integer(i64),
    Boolean(bool),
}

impl Delivery {
    fn outputs(view: PartyOutputs) -> Self {
        let outputs = view
            .0
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::Integer(i) => WireValue::Integer(i),
                    Value::Boolean(b) => WireValue::Boolean(b),
                };
                (name, value)
            })
            .collect();
        Delivery::Outputs(outputs)
    }
}

fn from_wire(outputs: Vec<(String, WireValue)>) -> PartyOutputs {
    PartyOutputs(
        outputs
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    WireValue::Integer(i) => Value::Integer(i),
                    WireValue::Boolean(b) => Value::Boolean(b),
                };
                (name, value)
            })
            .collect(),
    )
}

fn fingerprint(prg: &Program) -> Result<String, Error> {
    prg.fingerprint()
        .map_err(|e| Error::Fingerprint(format!("{e:?}")))
}

/// Submits the inputs of `party` to the evaluator and waits for the party's outputs.
///
/// The evaluator is the last participant of the channel.
#[instrument(level = Level::DEBUG, skip(channel, prg, inputs), err)]
pub async fn run_party(
    channel: &mut impl Channel,
    prg: &Program,
    party: PartyId,
    inputs: BTreeMap<String, i64>,
) -> Result<PartyOutputs, Error> {
    let evaluator = channel.participants().saturating_sub(1);
    let submission = Submission {
        fingerprint: fingerprint(prg)?,
        inputs,
    };
    send_to(channel, evaluator, "inputs", &submission).await?;
    match recv_from(channel, evaluator, "outputs").await? {
        Delivery::Outputs(outputs) => {
            debug!(outputs = outputs.len(), "received outputs");
            Ok(from_wire(outputs))
        }
        Delivery::Aborted(reason) => Err(Error::Aborted(reason)),
    }
}

async fn abort(channel: &mut impl Channel, parties: usize, reason: String) -> Result<(), Error> {
    warn!("aborting session: {reason}");
    for p in 0..parties {
        send_to(channel, p, "outputs", &Delivery::Aborted(reason.clone())).await?;
    }
    Ok(())
}

/// Collects the inputs of all parties, evaluates the program and delivers the outputs.
///
/// Each party receives only the outputs bound to it. If any submission is invalid, every party
/// is told that the session was aborted.
#[instrument(level = Level::DEBUG, skip_all, err)]
pub async fn trusted_evaluator(channel: &mut impl Channel, prg: &Program) -> Result<(), Error> {
    let parties = prg.parties().len();
    if channel.participants() != parties + 1 {
        return Err(Error::WrongParticipants {
            expected: parties + 1,
            actual: channel.participants(),
        });
    }
    let expected = fingerprint(prg)?;

    let mut inputs = InputValues::new();
    let mut mismatch = None;
    for (p, party) in prg.parties().iter().enumerate() {
        let submission: Submission = recv_from(channel, p, "inputs").await?;
        if submission.fingerprint != expected && mismatch.is_none() {
            mismatch = Some(Error::ProgramMismatch {
                party: p,
                expected: expected.clone(),
                actual: submission.fingerprint,
            });
        }
        for (name, value) in submission.inputs {
            inputs.set(party.name.clone(), name, value);
        }
    }
    debug!("evaluator received inputs from all {parties} parties");

    if let Some(e) = mismatch {
        abort(channel, parties, e.to_string()).await?;
        return Err(e);
    }
    let evaluation = match evaluate(prg, &inputs) {
        Ok(evaluation) => evaluation,
        Err(e) => {
            abort(channel, parties, e.to_string()).await?;
            return Err(e.into());
        }
    };
    for p in 0..parties {
        let view = evaluation.view(PartyId(p));
        send_to(channel, p, "outputs", &Delivery::outputs(view)).await?;
    }
    debug!("evaluator delivered outputs to all {parties} parties");
    Ok(())
}

/// Runs all parties and the evaluator as tasks of the current tokio runtime.
///
/// Returns the outputs received by every party, by party name.
pub async fn run_session(
    prg: &Program,
    inputs: &InputValues,
    config: &SessionConfig,
) -> Result<BTreeMap<String, PartyOutputs>, Error> {
    if config.buffer_capacity == 0 {
        let reason = "buffer_capacity must be at least 1".to_string();
        return Err(Error::InvalidConfig(reason));
    }
    for party in inputs.parties() {
        if prg.party_id(party).is_none() {
            return Err(EvalError::UnknownParty(party.to_string()).into());
        }
    }
    let parties = prg.parties().len();
    info!("starting session with {parties} parties");
    let mut channels =
        SimpleChannel::channels(parties + 1, config.buffer_capacity, config.recv_timeout);
    let Some(mut evaluator) = channels.pop() else {
        return Err(Error::Runtime("no channel for the evaluator".into()));
    };

    let shared = Arc::new(prg.clone());
    let mut handles = vec![];
    for (p, mut channel) in channels.into_iter().enumerate() {
        let prg = Arc::clone(&shared);
        let own_inputs = inputs.of(&prg.parties()[p].name);
        handles.push(task::spawn(async move {
            run_party(&mut channel, &prg, PartyId(p), own_inputs).await
        }));
    }

    let evaluated = trusted_evaluator(&mut evaluator, prg).await;

    let mut outputs = BTreeMap::new();
    let mut first_error = None;
    for (p, handle) in handles.into_iter().enumerate() {
        let result = handle
            .await
            .map_err(|e| Error::Runtime(format!("{e:?}")))
            .and_then(|r| r);
        match result {
            Ok(view) => {
                outputs.insert(prg.parties()[p].name.clone(), view);
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    evaluated?;
    if let Some(e) = first_error {
        return Err(e);
    }
    info!("session finished");
    Ok(outputs)
}

/// Simulates a session on a fresh single-threaded runtime.
pub fn simulate_session(
    prg: &Program,
    inputs: &InputValues,
    config: &SessionConfig,
) -> Result<BTreeMap<String, PartyOutputs>, Error> {
    let rt = Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| Error::Runtime(format!("could not start tokio runtime: {e}")))?;
    rt.block_on(run_session(prg, inputs, config))
}
