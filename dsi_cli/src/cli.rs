use crate::output::Output;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lists connected DSI cameras
    List,
    /// Prints identity and status of a camera
    Info(DeviceConf),
    /// Takes one exposure and writes it to a file
    Capture(CaptureConf),
    /// Camera display name stored in EEPROM
    Name(NameCommand),
}

#[derive(Args)]
pub struct DeviceConf {
    /// Camera to open, as "usb:BUS,ADDR"; defaults to the first one found
    #[clap(short, long, value_parser)]
    pub device: Option<String>,

    /// Log every command frame exchanged with the camera
    #[clap(long)]
    pub trace_frames: bool,
}

#[derive(Args)]
pub struct CaptureConf {
    /// Exposure time in seconds
    #[clap(short, long, value_parser, default_value_t = 1.0)]
    pub exposure: f64,

    /// Amplifier gain percentage
    #[clap(long, value_parser, default_value_t = 100)]
    pub gain: u8,

    /// Amplifier offset percentage, 50 is neutral
    #[clap(long, value_parser, default_value_t = 50)]
    pub offset: u8,

    /// Poll with non-blocking reads instead of sleeping inside the driver
    #[clap(long)]
    pub poll: bool,

    #[clap(flatten)]
    pub output: Output,

    #[clap(flatten)]
    pub device: DeviceConf,
}

#[derive(Args)]
pub struct NameCommand {
    #[clap(subcommand)]
    pub command: NameCommands,
}

#[derive(Subcommand)]
pub enum NameCommands {
    /// Prints the stored name
    Get(DeviceConf),
    /// Stores a new name
    Set(SetNameConf),
}

#[derive(Args)]
pub struct SetNameConf {
    /// New camera name
    #[clap(value_parser)]
    pub name: String,

    #[clap(flatten)]
    pub device: DeviceConf,
}
