use std::io::{BufReader, Write};
use std::process::{Child, ChildStdout, Command, Stdio};

use log::{debug, warn};

use super::{split_command, EventGenerator, GeneratorFactory};
use crate::error::{GenerationError, GeneratorError};
use crate::event::Event;

type EventStream = hepmc2::reader::Reader<BufReader<ChildStdout>>;

/// Event generator running as a separate process
///
/// The child receives one command per line on stdin, followed by
/// `Random:seed = <seed>`, and writes HepMC2 events to stdout.
pub struct ExternalGenerator {
    program: String,
    args: Vec<String>,
    commands: Vec<String>,
    seed: u64,
    child: Option<Child>,
    events: Option<EventStream>,
}

impl ExternalGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            commands: Vec::new(),
            seed: 0,
            child: None,
            events: None,
        }
    }

    fn spawn_error(&self, source: std::io::Error) -> GeneratorError {
        GeneratorError::Spawn {
            command: self.program.clone(),
            source,
        }
    }
}

impl EventGenerator for ExternalGenerator {
    fn configure(&mut self, command: &str) -> Result<(), GeneratorError> {
        // validate the shape only, the child interprets the content
        split_command(command)?;
        self.commands.push(command.to_owned());
        Ok(())
    }

    fn seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    fn init(&mut self) -> Result<(), GeneratorError> {
        debug!("Starting `{}` with seed {}", self.program, self.seed);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| self.spawn_error(err))?;
        let mut stdin = child.stdin.take().ok_or_else(|| {
            self.spawn_error(std::io::Error::other("no stdin handle"))
        })?;
        for command in &self.commands {
            writeln!(stdin, "{command}")?;
        }
        writeln!(stdin, "Random:seed = {}", self.seed)?;
        // closing stdin ends the configuration
        drop(stdin);
        let stdout = child.stdout.take().ok_or_else(|| {
            self.spawn_error(std::io::Error::other("no stdout handle"))
        })?;
        self.events = Some(hepmc2::reader::Reader::from(BufReader::new(stdout)));
        self.child = Some(child);
        Ok(())
    }

    fn next_event(&mut self) -> Result<Event, GenerationError> {
        let events = self.events.as_mut().ok_or(GenerationError::NotInitialised)?;
        match events.next() {
            Some(Ok(event)) => Ok(event.into()),
            Some(Err(err)) => Err(GenerationError::Malformed(err.to_string())),
            None => Err(GenerationError::Exhausted),
        }
    }
}

impl Drop for ExternalGenerator {
    fn drop(&mut self) {
        self.events = None;
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill() {
                debug!("Failed to stop `{}`: {err}", self.program);
            }
            match child.wait() {
                Ok(status) => debug!("`{}` exited with {status}", self.program),
                Err(err) => warn!("Failed to reap `{}`: {err}", self.program),
            }
        }
    }
}

/// Launches one generator process per worker
#[derive(Clone, Debug)]
pub struct ExternalFactory {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalFactory {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl GeneratorFactory for ExternalFactory {
    type Generator = ExternalGenerator;

    fn build(&self) -> Result<ExternalGenerator, GeneratorError> {
        Ok(ExternalGenerator::new(self.program.clone(), self.args.clone()))
    }
}
