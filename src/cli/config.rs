//! Validated driver configuration.
//!
//! [`DriverConfig::from_args`] is the only place command-line options are
//! checked against each other. Everything downstream can assume a coherent
//! configuration.

use std::time::Duration;

use crate::cli::args::{CliArgs, ColorWhen, OutputFormat};
use crate::errors::ConfigError;
use crate::filters::{AttrFilterGroup, AttrFilterSet, CombinedFilter, GroupAction, NameFilter};
use crate::runner::channel::{self, Handle};
use crate::suite::TestId;

/// How tests are executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    Inline,
    Isolated {
        timeout: Option<Duration>,
        capture_output: bool,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub color: ColorWhen,
    pub show_time: bool,
}

/// The test a child process was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildTarget {
    pub handle: Handle,
    pub test: TestId,
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub runs: usize,
    pub mode: ExecutionMode,
    pub filter: CombinedFilter,
    pub output: OutputSettings,
    pub child: Option<ChildTarget>,
}

impl DriverConfig {
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let child = match (args.child, args.child_test) {
            (Some(handle), Some(test)) => Some(ChildTarget { handle, test }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteChild),
        };
        if child.is_some() {
            let given = args
                .output
                .first_given()
                .or(args.show_terminal.then_some("--show-terminal"));
            if let Some(option) = given {
                return Err(ConfigError::OutputWithChild { option });
            }
        }

        let mode = if args.no_fork {
            if args.timeout.is_some() {
                return Err(ConfigError::TimeoutWithoutFork);
            }
            if args.show_terminal {
                return Err(ConfigError::ShowTerminalWithoutFork);
            }
            ExecutionMode::Inline
        } else {
            if !channel::SUPPORTED && child.is_none() {
                return Err(ConfigError::IsolationUnsupported);
            }
            ExecutionMode::Isolated {
                timeout: args.timeout.map(Duration::from_millis),
                capture_output: args.show_terminal,
            }
        };

        Ok(Self {
            runs: args.runs,
            mode,
            filter: build_filter(args)?,
            output: OutputSettings {
                format: args.output.output.unwrap_or_default(),
                color: args.output.color.unwrap_or_default(),
                show_time: args.output.show_time,
            },
            child,
        })
    }
}

/// `--attr` groups are consulted before `--skip-attr` groups.
fn build_filter(args: &CliArgs) -> Result<CombinedFilter, ConfigError> {
    let by_name = NameFilter::from_patterns(&args.tests)?;
    let run_groups = args
        .run_attrs
        .iter()
        .map(|text| AttrFilterGroup::parse(text, GroupAction::Run));
    let skip_groups = args
        .skip_attrs
        .iter()
        .map(|text| AttrFilterGroup::parse(text, GroupAction::Skip));
    let by_attr = run_groups
        .chain(skip_groups)
        .collect::<Result<AttrFilterSet, _>>()?;
    Ok(CombinedFilter::new(by_name, by_attr))
}
