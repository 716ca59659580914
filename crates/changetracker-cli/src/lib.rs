use changetracker_core::View;
use clap::ValueEnum;

pub mod commands;
pub mod pipeline;

/// View selector accepted on the command line
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ViewArg {
    Roadmap,
    ChangeAnnouncements,
    WhatsNew,
}

impl From<ViewArg> for View {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::Roadmap => View::Roadmap,
            ViewArg::ChangeAnnouncements => View::ChangeAnnouncements,
            ViewArg::WhatsNew => View::WhatsNew,
        }
    }
}
