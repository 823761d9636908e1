//! Command-line interface.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "livemsg", version, about = "Interactive chat messages that re-render in place")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run an interactive message in the terminal
    Demo {
        /// Which message to show
        #[arg(long, value_enum, default_value_t = DemoView::Pager)]
        view: DemoView,

        /// Number of items in the pager
        #[arg(long, default_value_t = 23)]
        items: usize,
    },

    /// Print the resolved configuration
    Config,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoView {
    Counter,
    Pager,
    Notice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_demo() {
        let cli = Cli::try_parse_from(["livemsg", "demo", "--view", "counter"]).unwrap();
        match cli.command {
            Some(Command::Demo { view, items }) => {
                assert_eq!(view, DemoView::Counter);
                assert_eq!(items, 23);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_no_command() {
        let cli = Cli::try_parse_from(["livemsg"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_reject_unknown_view() {
        assert!(Cli::try_parse_from(["livemsg", "demo", "--view", "poll"]).is_err());
    }
}
