use clap::{Args, Parser, Subcommand};
use hkp_config::{
    pretty_load, script,
    serial_coms::{KeypadCtl, Reading},
    SERIAL_NUMBER_PREFIX,
};
use hkp_common::protocol::Reply;
use std::{path::PathBuf, process, sync::Arc, thread::spawn};

use anyhow::{anyhow, Result};

fn parse_hex(v: Option<&str>) -> Result<Option<u16>> {
    let Some(v) = v else {
        return Ok(None);
    };
    let digits = v
        .strip_prefix("0x")
        .or_else(|| v.strip_prefix("0X"))
        .unwrap_or(v);
    u16::from_str_radix(digits, 16)
        .map(Some)
        .map_err(|_| anyhow!("Invalid hex number"))
}

/// Configure HKP hall-effect keypads
#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// The USB vendor_id of the device to find in 4 hex digits
    #[clap(long, short)]
    vendor_id: Option<String>,
    /// The USB product_id of the device to find in 4 hex digits
    #[clap(long, short)]
    product_id: Option<String>,
    /// The USB serial_number of the device to find. Must start with hkp:
    #[clap(long, short)]
    serial_number: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List HKP devices
    List,
    /// Print the keypad settings as a script `apply` accepts
    Get,
    /// Change one setting, for example `set key1.uh 250` or `set dkey.hid 0`
    Set(SetArgs),
    /// Rename the keypad
    Name(NameArgs),
    /// Save the current settings to flash
    Save,
    /// Restart the keypad in USB boot mode
    Boot,
    /// Show sensor readings
    Out(OutArgs),
    /// Check a settings script without sending it
    Validate(ValidateArgs),
    /// Send a settings script to the keypad
    Apply(ApplyArgs),
}

#[derive(Args)]
struct SetArgs {
    /// `key<N>.<setting>`, `dkey<N>.<setting>`; leave out N to change every key
    setting: String,
    value: String,
}

#[derive(Args)]
struct NameArgs {
    /// The new name; 1 to 128 characters
    #[clap(num_args = 1.., required = true)]
    name: Vec<String>,
}

#[derive(Args)]
struct OutArgs {
    /// Keep printing readings every scan
    #[clap(long, short)]
    stream: bool,

    /// Stop streaming after this many readings
    #[clap(long, short, requires = "stream")]
    count: Option<usize>,
}

#[derive(Args)]
struct ValidateArgs {
    /// settings script
    file: PathBuf,
}

#[derive(Args)]
struct ApplyArgs {
    /// settings script
    file: PathBuf,

    /// Save to flash once every line is sent
    #[clap(long)]
    save: bool,
}

struct DeviceFinder {
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    serial_number: String,
}

impl DeviceFinder {
    fn from_cli(cli: &Cli) -> Result<Self> {
        Ok(Self {
            vendor_id: parse_hex(cli.vendor_id.as_deref())?,
            product_id: parse_hex(cli.product_id.as_deref())?,
            serial_number: cli.serial_number.clone().unwrap_or_default(),
        })
    }

    fn not_found(&self) -> anyhow::Error {
        static ANY: &str = "any";
        fn u16_to_hex(a: Option<u16>) -> String {
            match a {
                Some(n) => format!("{n:04x}"),
                None => ANY.to_owned(),
            }
        }
        anyhow!(
            "No matching HKP usb device found!\n  vendor_id: {}, product_id: {}, serial_number: {}",
            u16_to_hex(self.vendor_id),
            u16_to_hex(self.product_id),
            if self.serial_number.is_empty() {
                ANY
            } else {
                self.serial_number.as_str()
            }
        )
    }

    fn iter_keypads(&self) -> Result<impl Iterator<Item = nusb::DeviceInfo> + '_> {
        let ans = nusb::list_devices()?.filter(move |d| {
            d.serial_number()
                .unwrap_or_default()
                .starts_with(SERIAL_NUMBER_PREFIX)
                && self.vendor_id.is_none_or(|id| d.vendor_id() == id)
                && self.product_id.is_none_or(|id| d.product_id() == id)
                && (self.serial_number.is_empty()
                    || d.serial_number() == Some(self.serial_number.as_str()))
        });
        Ok(ans)
    }

    /// Opens the first matching keypad and starts a thread reading its replies.
    fn open_keypad(&self) -> Result<Arc<KeypadCtl<nusb::Interface>>> {
        let info = self.iter_keypads()?.next().ok_or_else(|| self.not_found())?;
        log::info!("using {}", info.serial_number().unwrap_or_default());
        let ctl = Arc::new(KeypadCtl::open(&info.open()?)?);
        let listener = ctl.clone();
        spawn(move || {
            if let Err(err) = listener.listen() {
                log::debug!("listener stopped: {err}");
            }
        });
        Ok(ctl)
    }

    fn list_usb(&self) -> Result<()> {
        println!("HKP keypads:");
        for dev in self.iter_keypads()? {
            print_dev_info(&dev);
        }
        println!();
        Ok(())
    }

    fn get(&self) -> Result<()> {
        let settings = self.open_keypad()?.fetch_settings()?;
        print!("{settings}");
        Ok(())
    }

    fn set(&self, args: &SetArgs) -> Result<()> {
        self.send_checked(&format!("{} {}", args.setting, args.value))
    }

    fn name(&self, args: &NameArgs) -> Result<()> {
        self.send_checked(&format!("name {}", args.name.join(" ")))
    }

    fn send_checked(&self, line: &str) -> Result<()> {
        script::check_line(line).map_err(|err| anyhow!(err))?;
        self.open_keypad()?.send_line(line)
    }

    fn send(&self, line: &str) -> Result<()> {
        self.open_keypad()?.send_line(line)
    }

    fn out(&self, args: &OutArgs) -> Result<()> {
        let ctl = self.open_keypad()?;
        if args.stream {
            let mut left = args.count;
            return ctl.stream_readings(|r| {
                print_reading(r);
                match left.as_mut() {
                    Some(n) => {
                        *n = n.saturating_sub(1);
                        *n > 0
                    }
                    None => true,
                }
            });
        }
        let keys = ctl.fetch_settings()?.analog.len();
        for r in ctl.fetch_readings(keys)? {
            print_reading(r);
        }
        Ok(())
    }

    fn apply(&self, args: &ApplyArgs) -> Result<()> {
        let src = pretty_load(&args.file)
            .map_err(|err| anyhow!("Failed to load \"{}\"!\n    {err}", args.file.display()))?;
        let lines = script::parse_script(&src)?;
        let ctl = self.open_keypad()?;
        for line in lines {
            ctl.send_line(line)?;
        }
        if args.save {
            ctl.send_line("save")?;
        }
        // the keypad answers get only after every earlier line is applied
        ctl.fetch_settings()?;
        Ok(())
    }
}

fn validate(args: &ValidateArgs) -> Result<()> {
    let src = pretty_load(&args.file)
        .map_err(|err| anyhow!("Failed to load \"{}\"!\n    {err}", args.file.display()))?;
    println!("{} commands", script::parse_script(&src)?.len());
    Ok(())
}

fn print_reading(r: Reading) {
    let reply: Reply<'_> = Reply::Out {
        index: r.index,
        raw: r.raw,
        mapped: r.mapped,
    };
    println!("{reply}");
}

fn print_dev_info(dev: &nusb::DeviceInfo) {
    println!(
        "Device: {:03}.{:03}, Id: {:04x}:{:04x}, Name: {} - {}, Serial: {} ",
        dev.bus_number(),
        dev.device_address(),
        dev.vendor_id(),
        dev.product_id(),
        dev.manufacturer_string().unwrap_or(""),
        dev.product_string().unwrap_or(""),
        dev.serial_number().unwrap_or(""),
    );
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(message) = run(&cli) {
        eprintln!("{message:#}");
        process::exit(1);
    };
}

fn run(cli: &Cli) -> Result<()> {
    let finder = DeviceFinder::from_cli(cli)?;

    match &cli.command {
        Commands::List => finder.list_usb(),
        Commands::Get => finder.get(),
        Commands::Set(args) => finder.set(args),
        Commands::Name(args) => finder.name(args),
        Commands::Save => finder.send("save"),
        Commands::Boot => finder.send("boot"),
        Commands::Out(args) => finder.out(args),
        Commands::Validate(args) => validate(args),
        Commands::Apply(args) => finder.apply(args),
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_hex_ids() {
        assert_eq!(parse_hex(Some("0x6e0F")).unwrap(), Some(0x6e0f));
        assert_eq!(parse_hex(Some("0010")).unwrap(), Some(0x10));
        assert_eq!(parse_hex(None).unwrap(), None);
        assert!(parse_hex(Some("zz")).is_err());
    }

    #[test]
    fn validate_cmd() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# two keys\nkey.rt 1\nkey2.char x\nsave").unwrap();

        let args = ValidateArgs {
            file: file.path().to_owned(),
        };
        validate(&args).expect("to be valid");

        writeln!(file, "key2.char xyz").unwrap();
        assert!(validate(&args).is_err());
    }

    #[test]
    fn cli_arguments() {
        let cli = Cli::try_parse_from(["hkp-config", "-v", "6e0f", "set", "key1.uh", "250"])
            .unwrap();
        let finder = DeviceFinder::from_cli(&cli).unwrap();
        assert_eq!(finder.vendor_id, Some(0x6e0f));
        assert!(matches!(
            &cli.command,
            Commands::Set(SetArgs { setting, value }) if setting == "key1.uh" && value == "250"
        ));

        let cli = Cli::try_parse_from(["hkp-config", "name", "Left", "Pad"]).unwrap();
        assert!(matches!(&cli.command, Commands::Name(args) if args.name.join(" ") == "Left Pad"));

        assert!(Cli::try_parse_from(["hkp-config", "out", "--count", "3"]).is_err());
    }

    #[test]
    fn not_found_message() {
        let cli = Cli::try_parse_from(["hkp-config", "-s", "hkp:0010", "get"]).unwrap();
        let finder = DeviceFinder::from_cli(&cli).unwrap();
        assert_eq!(
            finder.not_found().to_string(),
            "No matching HKP usb device found!\n  \
             vendor_id: any, product_id: any, serial_number: hkp:0010"
        );
    }
}
