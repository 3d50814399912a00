//! Panel link monitor.
//!
//! Attach a USB-UART adapter to the glasses' panel link (TX pin 41) and
//! print every display update the firmware sends.

mod protocol;

use std::io::Read;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use protocol::take_frames;

#[derive(Parser)]
#[command(name = "panel-monitor")]
#[command(about = "Decode panel link frames from the glasses")]
struct Args {
    /// Serial port wired to the panel link
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut port = serialport::new(&args.port, args.baud)
        .timeout(Duration::from_millis(200))
        .open()?;
    println!("{} {} @ {}", "Listening on".bold(), args.port, args.baud);

    let mut pending = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        match port.read(&mut buf) {
            Ok(n) => pending.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => return Err(e.into()),
        }

        match take_frames(&mut pending) {
            Ok(frames) => {
                for frame in frames {
                    println!(
                        "{} {:8} {}",
                        (frame.tag as char).to_string().cyan(),
                        frame.slot(),
                        frame.text().replace('\n', "⏎")
                    );
                }
            }
            Err(e) => {
                println!("{} {}", "desync:".red(), e);
                pending.clear();
            }
        }
    }
}
