//! blueprobe - GATT client command-line tool
//!
//! Connects to a remote Bluetooth device over L2CAP (LE or BR/EDR),
//! runs exactly one GATT procedure, and optionally stays resident
//! printing notifications and indications.

use std::process::ExitCode;

use clap::{ArgGroup, CommandFactory, Parser};
use log::debug;

use blueprobe::gatt::parse_hex_value;
use blueprobe::{
    hci, BdAddr, ConnectOptions, GattClient, L2capSocket, PduChannel, Transport,
};

#[derive(Debug, Parser)]
#[command(name = "blueprobe")]
#[command(about = "Discover, read, and write GATT attributes on a remote Bluetooth device")]
#[command(group = ArgGroup::new("command").args([
    "primary",
    "characteristics",
    "char_read",
    "char_write",
    "char_desc",
]))]
struct Args {
    /// Specify local adapter interface ("hciX" or address)
    #[arg(short = 'i', long = "adapter", value_name = "hciX")]
    adapter: Option<String>,

    /// Specify remote Bluetooth address
    #[arg(short = 'b', long = "device", value_name = "MAC")]
    device: Option<String>,

    /// Specify the MTU size
    #[arg(short = 'm', long = "mtu", value_name = "MTU", value_parser = parse_u16_arg, default_value = "0")]
    mtu: u16,

    /// Use Bluetooth Low Energy transport
    #[arg(long)]
    le: bool,

    /// Primary Service Discovery
    #[arg(long)]
    primary: bool,

    /// Characteristics Discovery
    #[arg(long)]
    characteristics: bool,

    /// Characteristics Value/Descriptor Read
    #[arg(long = "char-read")]
    char_read: bool,

    /// Characteristics Value Write
    #[arg(long = "char-write")]
    char_write: bool,

    /// Characteristics Descriptor Discovery
    #[arg(long = "char-desc")]
    char_desc: bool,

    /// Listen for notifications and indications
    #[arg(long)]
    listen: bool,

    /// Starting handle (optional)
    #[arg(short = 's', long = "start", value_parser = parse_u16_arg, default_value = "0x0001")]
    start: u16,

    /// Ending handle (optional)
    #[arg(short = 'e', long = "end", value_parser = parse_u16_arg, default_value = "0xffff")]
    end: u16,

    /// Read/Write characteristic by handle (required)
    #[arg(short = 'a', long = "handle", value_name = "HANDLE", value_parser = parse_u16_arg)]
    handle: Option<u16>,

    /// Write characteristic value (required for write operation)
    #[arg(short = 'n', long = "value", value_name = "HEX")]
    value: Option<String>,
}

/// Accepts decimal or 0x-prefixed hex.
fn parse_u16_arg(s: &str) -> Result<u16, String> {
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    u16::from_str_radix(digits, radix).map_err(|e| e.to_string())
}

/// The one top-level procedure selected for this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    DiscoverPrimary,
    DiscoverCharacteristics,
    ReadCharacteristic,
    WriteCharacteristic,
    DiscoverDescriptors,
}

fn select_command(args: &Args) -> Option<Command> {
    // The clap group guarantees at most one of these is set
    if args.primary {
        Some(Command::DiscoverPrimary)
    } else if args.characteristics {
        Some(Command::DiscoverCharacteristics)
    } else if args.char_read {
        Some(Command::ReadCharacteristic)
    } else if args.char_write {
        Some(Command::WriteCharacteristic)
    } else if args.char_desc {
        Some(Command::DiscoverDescriptors)
    } else {
        None
    }
}

/// Connection and procedure parameters, built once from the parsed
/// options and passed down by reference.
#[derive(Debug)]
struct Config {
    source: BdAddr,
    destination: BdAddr,
    transport: Transport,
    mtu: u16,
    start: u16,
    end: u16,
    handle: Option<u16>,
    /// Decoded write value
    value: Vec<u8>,
    listen: bool,
}

type ToolError = Box<dyn std::error::Error>;

fn build_config(args: &Args, command: Command) -> Result<Config, ToolError> {
    let destination: BdAddr = args
        .device
        .as_deref()
        .ok_or("Remote Bluetooth address required")?
        .parse()?;

    let source = match args.adapter.as_deref() {
        None => BdAddr::ANY,
        Some(name) => resolve_adapter(name)?,
    };

    // Per-command argument contracts, checked before any I/O
    let handle = args.handle;
    if matches!(
        command,
        Command::ReadCharacteristic | Command::WriteCharacteristic
    ) && handle.unwrap_or(0) == 0
    {
        return Err("A valid handle is required".into());
    }

    let value = if command == Command::WriteCharacteristic {
        let text = args.value.as_deref().unwrap_or("");
        if text.is_empty() {
            return Err("A value is required".into());
        }
        parse_hex_value(text)?
    } else {
        Vec::new()
    };

    Ok(Config {
        source,
        destination,
        transport: if args.le {
            Transport::LowEnergy
        } else {
            Transport::BrEdr
        },
        mtu: args.mtu,
        start: args.start,
        end: args.end,
        handle,
        value,
        listen: args.listen,
    })
}

fn resolve_adapter(name: &str) -> Result<BdAddr, ToolError> {
    if let Some(index) = name.strip_prefix("hci") {
        let dev_id: u16 = index.parse().map_err(|_| "Invalid adapter interface")?;
        Ok(hci::device_address(dev_id)?)
    } else {
        Ok(name.parse()?)
    }
}

/// Orchestrator states; exactly one pass through them per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Connecting,
    Running(Command),
    Done(bool),
}

struct Tool {
    state: State,
}

impl Tool {
    fn new() -> Self {
        Tool { state: State::Idle }
    }

    fn enter(&mut self, next: State) {
        debug!("state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn run(config: &Config, command: Command) -> Result<(), ToolError> {
    let mut tool = Tool::new();

    tool.enter(State::Connecting);
    let opts = ConnectOptions {
        source: config.source,
        destination: config.destination,
        transport: config.transport,
        mtu: config.mtu,
    };
    let socket = L2capSocket::connect(&opts)?;
    let mut client = GattClient::new(socket);

    // Arm the event printers before the procedure starts
    if config.listen {
        client.on_notification(Box::new(|handle: u16, value: &[u8]| {
            println!(
                "Notification handle = 0x{:04x} value: {}",
                handle,
                hex_string(value)
            );
        }));
        client.on_indication(Box::new(|handle: u16, value: &[u8]| {
            println!(
                "Indication   handle = 0x{:04x} value: {}",
                handle,
                hex_string(value)
            );
        }));
    }

    tool.enter(State::Running(command));
    let result = run_command(&mut client, config, command);

    if config.listen {
        // The procedure's outcome does not end the process in listen
        // mode; stay resident until the channel fails.
        if let Err(e) = result {
            eprintln!("{}", e);
        }
        client.listen()?;
        Ok(())
    } else {
        let ok = result.is_ok();
        tool.enter(State::Done(ok));
        result
    }
}

fn run_command<C: PduChannel>(
    client: &mut GattClient<C>,
    config: &Config,
    command: Command,
) -> Result<(), ToolError> {
    match command {
        Command::DiscoverPrimary => client
            .discover_primary(config.start, config.end, |group| {
                println!(
                    "attr handle = 0x{:04x}, end grp handle = 0x{:04x}, attr value (UUID) = {}",
                    group.start_handle, group.end_handle, group.uuid
                );
            })
            .map_err(|e| format!("Discover all primary services failed: {}", e))?,

        Command::DiscoverCharacteristics => client
            .discover_characteristics(config.start, config.end, |ch| {
                println!(
                    "handle = 0x{:04x}, char properties = 0x{:02x}, char value handle = 0x{:04x}, uuid = {}",
                    ch.declaration_handle,
                    ch.properties.bits(),
                    ch.value_handle,
                    ch.uuid
                );
            })
            .map_err(|e| format!("Discover all characteristics failed: {}", e))?,

        Command::ReadCharacteristic => {
            let value = client
                .read_value(config.handle.unwrap_or(0))
                .map_err(|e| format!("Characteristic value/descriptor read failed: {}", e))?;
            println!("Characteristic value/descriptor: {}", hex_string(&value));
        }

        Command::WriteCharacteristic => client
            .write_command(config.handle.unwrap_or(0), &config.value)
            .map_err(|e| format!("Characteristic value write failed: {}", e))?,

        Command::DiscoverDescriptors => client
            .discover_descriptors(config.start, config.end, |desc| {
                println!("handle = 0x{:04x}, uuid = {}", desc.handle, desc.uuid);
            })
            .map_err(|e| format!("Discover all characteristic descriptors failed: {}", e))?,
    }

    Ok(())
}

fn hex_string(value: &[u8]) -> String {
    value
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e)
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    // Selecting no command prints usage and fails
    let Some(command) = select_command(&args) else {
        let mut usage = Args::command();
        let _ = usage.print_help();
        return ExitCode::FAILURE;
    };

    let config = match build_config(&args, command) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&config, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn numeric_arguments_accept_hex_and_decimal() {
        assert_eq!(parse_u16_arg("0x0010").unwrap(), 0x0010);
        assert_eq!(parse_u16_arg("0XFFFF").unwrap(), 0xFFFF);
        assert_eq!(parse_u16_arg("23").unwrap(), 23);
        assert!(parse_u16_arg("0x10000").is_err());
        assert!(parse_u16_arg("nope").is_err());
    }

    #[test]
    fn exactly_one_command_is_selected() {
        let args = parse(&["blueprobe", "-b", "00:11:22:33:44:55", "--primary"]);
        assert_eq!(select_command(&args), Some(Command::DiscoverPrimary));

        let args = parse(&["blueprobe", "-b", "00:11:22:33:44:55"]);
        assert_eq!(select_command(&args), None);

        // The parser rejects conflicting command flags
        assert!(Args::try_parse_from([
            "blueprobe",
            "-b",
            "00:11:22:33:44:55",
            "--primary",
            "--char-read"
        ])
        .is_err());
    }

    #[test]
    fn range_defaults_cover_the_handle_space() {
        let args = parse(&["blueprobe", "-b", "00:11:22:33:44:55", "--primary"]);
        assert_eq!(args.start, 0x0001);
        assert_eq!(args.end, 0xFFFF);
    }

    #[test]
    fn read_requires_a_nonzero_handle() {
        let args = parse(&["blueprobe", "-b", "00:11:22:33:44:55", "--char-read"]);
        assert!(build_config(&args, Command::ReadCharacteristic).is_err());

        let args = parse(&[
            "blueprobe",
            "-b",
            "00:11:22:33:44:55",
            "--char-read",
            "-a",
            "0x0000",
        ]);
        assert!(build_config(&args, Command::ReadCharacteristic).is_err());
    }

    #[test]
    fn write_requires_and_decodes_a_value() {
        let args = parse(&[
            "blueprobe",
            "-b",
            "00:11:22:33:44:55",
            "--char-write",
            "-a",
            "0x0021",
        ]);
        assert!(build_config(&args, Command::WriteCharacteristic).is_err());

        let args = parse(&[
            "blueprobe",
            "-b",
            "00:11:22:33:44:55",
            "--char-write",
            "-a",
            "0x0021",
            "-n",
            "0102AB",
        ]);
        let config = build_config(&args, Command::WriteCharacteristic).unwrap();
        assert_eq!(config.value, vec![0x01, 0x02, 0xAB]);
    }

    #[test]
    fn device_address_is_required() {
        let args = parse(&["blueprobe", "--primary"]);
        assert!(build_config(&args, Command::DiscoverPrimary).is_err());
    }

    #[test]
    fn value_hex_output_format() {
        assert_eq!(hex_string(&[0x01, 0xAB, 0x00]), "01 ab 00");
        assert_eq!(hex_string(&[]), "");
    }
}
