//! Line-oriented operator console
//!
//! Reads one command per line, dispatches it to the [`ControlBinder`] and
//! doubles as the [`Operator`] for confirmations and device messages.
//!
//! Input lines are read on a dedicated thread and handed over through a
//! channel. A read pending on that thread never holds up runtime shutdown.

use crate::{
    device_client::DeviceClient,
    model::{ControlSource, Property},
    operator::Operator,
    services::controls::ControlBinder,
    types::Effect,
};
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::{
    io::{BufRead, BufReader},
    str::FromStr,
    sync::Arc,
    thread,
};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt, Stdout},
    sync::{Mutex, mpsc},
};

pub const HELP: &str = "\
commands:
  brightness <0-100> [slider|input]
  speed <10-100> [slider|input]
  leds <1-1000> [slider|input]
  color <#rrggbb>
  group <n>
  ignore-sun
  save
  erase
  restart
  regions
  region <name>
  effect <on|off|wave|stairs|toggle-wave-direction|rgb|motion-detected-1|motion-detected-2>
  refresh
  show
  help
  quit
";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Set {
        property: Property,
        source: ControlSource,
        value: i64,
    },
    Color(String),
    Group(u16),
    ToggleIgnoreSun,
    Save,
    EraseNetworkData,
    Restart,
    Regions,
    Region(String),
    Effect(Effect),
    Refresh,
    Show,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            bail!("failed to parse command: empty line");
        };
        let arg = words.next();

        let command = match name.to_ascii_lowercase().as_str() {
            "brightness" => set_command(Property::Brightness, arg, words.next())?,
            "speed" => set_command(Property::StairsSpeed, arg, words.next())?,
            "leds" => set_command(Property::LedCount, arg, words.next())?,
            "color" => Command::Color(required(name, arg)?.to_string()),
            "group" => Command::Group(
                required(name, arg)?
                    .parse()
                    .context("failed to parse group: invalid format")?,
            ),
            "ignore-sun" => Command::ToggleIgnoreSun,
            "save" => Command::Save,
            "erase" => Command::EraseNetworkData,
            "restart" => Command::Restart,
            "regions" => Command::Regions,
            "region" => Command::Region(required(name, arg)?.to_string()),
            "effect" => Command::Effect(required(name, arg)?.parse()?),
            "refresh" => Command::Refresh,
            "show" => Command::Show,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("failed to parse command: unknown command {other:?}"),
        };

        Ok(command)
    }
}

fn required<'a>(command: &str, arg: Option<&'a str>) -> Result<&'a str> {
    arg.with_context(|| format!("failed to parse {command}: missing argument"))
}

fn set_command(property: Property, value: Option<&str>, source: Option<&str>) -> Result<Command> {
    let value = required(property.label(), value)?
        .parse::<i64>()
        .with_context(|| format!("failed to parse {}: invalid format", property.label()))?;

    let source = match source {
        None | Some("input") => ControlSource::Input,
        Some("slider") => ControlSource::Slider,
        Some(other) => bail!("failed to parse control {other:?}: expected slider or input"),
    };

    Ok(Command::Set {
        property,
        source,
        value,
    })
}

/// Console input and output shared by the command loop and the operator prompts
pub struct Console<W> {
    input: Mutex<mpsc::UnboundedReceiver<String>>,
    output: Mutex<W>,
}

impl Console<Stdout> {
    pub fn stdio() -> Result<Self> {
        Self::new(BufReader::new(std::io::stdin()), tokio::io::stdout())
    }
}

impl<W> Console<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Start reading `input` line by line on its own thread
    pub fn new<R>(input: R, output: W) -> Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || {
                for line in input.lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!("failed to read console input: {e}");
                            return;
                        }
                    }
                }
            })
            .context("failed to spawn console input thread")?;

        Ok(Self {
            input: Mutex::new(rx),
            output: Mutex::new(output),
        })
    }

    /// Next input line, `None` at end of input
    pub async fn read_line(&self) -> Option<String> {
        self.input.lock().await.recv().await
    }

    pub async fn write(&self, text: &str) -> Result<()> {
        let mut output = self.output.lock().await;
        output
            .write_all(text.as_bytes())
            .await
            .context("failed to write console output")?;
        output.flush().await.context("failed to flush console output")
    }
}

impl<W> Operator for Console<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, prompt: &'static str) -> bool {
        if let Err(e) = self.write(&format!("{prompt} [y/N] ")).await {
            warn!("confirm: {e:#}");
            return false;
        }

        match self.read_line().await {
            Some(answer) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            None => false,
        }
    }

    async fn notify(&self, message: String) {
        if let Err(e) = self.write(&format!("{message}\n")).await {
            warn!("notify: {e:#}");
        }
    }
}

/// Run the command loop until `quit` or end of input
pub async fn run<C, W>(console: Arc<Console<W>>, binder: ControlBinder<C, Console<W>>) -> Result<()>
where
    C: DeviceClient + Send + Sync + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    console.write(HELP).await?;
    show(&console, &binder).await?;

    loop {
        console.write("> ").await?;
        let Some(line) = console.read_line().await else {
            debug!("console input closed");
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                console.write(&format!("error: {e:#}\n")).await?;
                continue;
            }
        };

        if command == Command::Quit {
            return Ok(());
        }

        if let Err(e) = execute(&console, &binder, command).await {
            console.write(&format!("error: {e:#}\n")).await?;
        }
    }
}

async fn execute<C, W>(
    console: &Console<W>,
    binder: &ControlBinder<C, Console<W>>,
    command: Command,
) -> Result<()>
where
    C: DeviceClient + Send + Sync + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    debug!("execute {command:?}");

    // plain setting updates are not awaited
    match command {
        Command::Set {
            property,
            source: ControlSource::Slider,
            value,
        } => {
            binder.set_from_slider(property, value).await;
        }
        Command::Set {
            property,
            source: ControlSource::Input,
            value,
        } => {
            binder.set_from_input(property, value).await;
        }
        Command::Color(hex) => {
            binder.set_color(&hex).await?;
        }
        Command::Group(index) => {
            binder.set_stairs_group_size(index).await?;
        }
        Command::ToggleIgnoreSun => {
            binder.toggle_ignore_sun().await?;
            let label = binder.store().state().read().await.ignore_sun_label();
            console.write(&format!("{label}\n")).await?;
        }
        Command::Save => binder.save_parameters().await?,
        Command::EraseNetworkData => {
            binder.erase_network_data().await?;
        }
        Command::Restart => {
            if binder.restart_board().await? {
                console.write("restarting board\n").await?;
            }
        }
        Command::Regions => {
            let listing = {
                let state = binder.store().state().read().await;
                state
                    .regions
                    .options
                    .iter()
                    .enumerate()
                    .map(|(index, region)| {
                        let marker = if state.regions.selected == Some(index) { '*' } else { ' ' };
                        format!("{marker} {} ({})\n", region.name, region.timezone)
                    })
                    .collect::<String>()
            };
            console.write(&listing).await?;
        }
        Command::Region(name) => {
            binder.select_region(&name).await?;
            binder.update_region().await?;
        }
        Command::Effect(effect) => {
            binder.trigger_effect(effect);
        }
        Command::Refresh => {
            binder.store().bootstrap().await?;
            show(console, binder).await?;
        }
        Command::Show => show(console, binder).await?,
        Command::Help => console.write(HELP).await?,
        Command::Quit => {}
    }

    Ok(())
}

async fn show<C, W>(console: &Console<W>, binder: &ControlBinder<C, Console<W>>) -> Result<()>
where
    C: DeviceClient + Send + Sync + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let rendered = binder.store().state().read().await.to_string();
    console.write(&rendered).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device_client::MockDeviceClient,
        model::PanelState,
        services::sync::{SettingsStore, StoreOptions},
        types::IgnoreSunToggle,
    };
    use mockall::predicate::eq;

    type TestConsole = Console<Vec<u8>>;

    fn console(input: &'static str) -> Arc<TestConsole> {
        Arc::new(Console::new(input.as_bytes(), Vec::new()).expect("input thread starts"))
    }

    async fn output(console: &TestConsole) -> String {
        String::from_utf8(console.output.lock().await.clone()).unwrap()
    }

    async fn run_with(client: MockDeviceClient, input: &'static str) -> String {
        let console = console(input);
        let store = SettingsStore::new(
            Arc::new(client),
            PanelState::new(5).shared(),
            StoreOptions::default(),
        );
        let binder = ControlBinder::new(store, console.clone());

        run(console.clone(), binder).await.expect("console loop ends");
        output(&console).await
    }

    mod parse {
        use super::*;

        #[test]
        fn set_commands_default_to_input() {
            assert_eq!(
                "brightness 150".parse::<Command>().unwrap(),
                Command::Set {
                    property: Property::Brightness,
                    source: ControlSource::Input,
                    value: 150,
                }
            );
            assert_eq!(
                "speed -3 slider".parse::<Command>().unwrap(),
                Command::Set {
                    property: Property::StairsSpeed,
                    source: ControlSource::Slider,
                    value: -3,
                }
            );
        }

        #[test]
        fn parses_arguments() {
            assert_eq!(
                "color #12ff00".parse::<Command>().unwrap(),
                Command::Color("#12ff00".to_string())
            );
            assert_eq!("group 3".parse::<Command>().unwrap(), Command::Group(3));
            assert_eq!(
                "region Europe/Kyiv".parse::<Command>().unwrap(),
                Command::Region("Europe/Kyiv".to_string())
            );
            assert_eq!(
                "effect wave".parse::<Command>().unwrap(),
                Command::Effect(Effect::Wave)
            );
            assert_eq!("QUIT".parse::<Command>().unwrap(), Command::Quit);
        }

        #[test]
        fn rejects_malformed_commands() {
            assert!("".parse::<Command>().is_err());
            assert!("brightness".parse::<Command>().is_err());
            assert!("brightness high".parse::<Command>().is_err());
            assert!("leds 10 knob".parse::<Command>().is_err());
            assert!("group -1".parse::<Command>().is_err());
            assert!("dance".parse::<Command>().is_err());
        }
    }

    mod operator {
        use super::*;

        #[tokio::test]
        async fn confirm_accepts_yes() {
            let console = console("y\n");
            assert!(console.confirm("Proceed?").await);
            assert_eq!(output(&console).await, "Proceed? [y/N] ");
        }

        #[tokio::test]
        async fn confirm_defaults_to_no() {
            assert!(!console("\n").confirm("Proceed?").await);
            assert!(!console("nope\n").confirm("Proceed?").await);
            assert!(!console("").confirm("Proceed?").await);
        }

        #[tokio::test]
        async fn notify_prints_message() {
            let console = console("");
            console.notify("Parameters saved".to_string()).await;
            assert_eq!(output(&console).await, "Parameters saved\n");
        }
    }

    mod input {
        use super::*;
        use std::{os::unix::net::UnixStream, sync::mpsc as std_mpsc, time::Duration};

        #[test]
        fn pending_read_does_not_block_runtime_shutdown() {
            // the peer stays open, so the input thread blocks in read
            let (reader, _peer) = UnixStream::pair().expect("socket pair");
            let (done_tx, done_rx) = std_mpsc::channel();

            thread::spawn(move || {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .expect("runtime starts");
                runtime.block_on(async {
                    let console = Console::new(BufReader::new(reader), Vec::new())
                        .expect("input thread starts");
                    let line =
                        tokio::time::timeout(Duration::from_millis(50), console.read_line()).await;
                    assert!(line.is_err());
                });
                drop(runtime);
                let _ = done_tx.send(());
            });

            assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        }

        #[tokio::test]
        async fn lines_arrive_in_order_then_end() {
            let console = console("first\nsecond\n");

            assert_eq!(console.read_line().await.as_deref(), Some("first"));
            assert_eq!(console.read_line().await.as_deref(), Some("second"));
            assert_eq!(console.read_line().await, None);
        }
    }

    mod command_loop {
        use super::*;

        #[tokio::test]
        async fn reports_parse_errors_and_continues() {
            let out = run_with(MockDeviceClient::new(), "dance\nshow\nquit\n").await;

            assert!(out.contains("error: failed to parse command: unknown command \"dance\""));
            assert!(out.contains("Ignore Sun: OFF"));
        }

        #[tokio::test]
        async fn save_shows_device_message() {
            let mut client = MockDeviceClient::new();
            client
                .expect_save_parameters()
                .times(1)
                .returning(|| Box::pin(async { Ok("Parameters saved".to_string()) }));

            let out = run_with(client, "save\n").await;
            assert!(out.contains("Parameters saved\n"));
        }

        #[tokio::test]
        async fn declined_erase_sends_nothing() {
            let mut client = MockDeviceClient::new();
            client.expect_erase_network_data().never();

            let out = run_with(client, "erase\nn\nquit\n").await;
            assert!(out.contains("Are you sure you want to erase network data? [y/N] "));
        }

        #[tokio::test]
        async fn toggle_prints_message_and_label() {
            let mut client = MockDeviceClient::new();
            client.expect_toggle_ignore_sun().times(1).returning(|| {
                Box::pin(async {
                    Ok(IgnoreSunToggle {
                        ignore_sun: true,
                        message: "Ignore sun enabled".to_string(),
                    })
                })
            });

            let out = run_with(client, "ignore-sun\nquit\n").await;
            assert!(out.contains("Ignore sun enabled\nIgnore Sun: ON\n"));
        }

        #[tokio::test]
        async fn invalid_color_is_reported() {
            let mut client = MockDeviceClient::new();
            client.expect_set_color().never();

            let out = run_with(client, "color red\nquit\n").await;
            assert!(out.contains("error: failed to parse color"));
        }

        #[tokio::test]
        async fn region_without_list_is_reported() {
            let mut client = MockDeviceClient::new();
            client.expect_set_region().never();

            let out = run_with(client, "region Europe/Kyiv\n").await;
            assert!(out.contains("error: failed to select region"));
        }

        #[tokio::test]
        async fn regions_lists_selection() {
            let console = console("regions\nquit\n");
            let store = SettingsStore::new(
                Arc::new(MockDeviceClient::new()),
                PanelState::new(5).shared(),
                StoreOptions::default(),
            );
            store.state().write().await.regions.repopulate(
                vec![
                    crate::types::Region {
                        name: "Europe/London".to_string(),
                        timezone: "GMT0BST,M3.5.0/1,M10.5.0".to_string(),
                    },
                    crate::types::Region {
                        name: "Europe/Kyiv".to_string(),
                        timezone: "EET-2EEST,M3.5.0/3,M10.5.0/4".to_string(),
                    },
                ],
                "Europe/Kyiv",
            );
            let binder = ControlBinder::new(store, console.clone());

            run(console.clone(), binder).await.unwrap();

            let out = output(&console).await;
            assert!(out.contains("  Europe/London (GMT0BST,M3.5.0/1,M10.5.0)\n"));
            assert!(out.contains("* Europe/Kyiv (EET-2EEST,M3.5.0/3,M10.5.0/4)\n"));
        }

        #[tokio::test]
        async fn group_outside_row_is_reported() {
            let mut client = MockDeviceClient::new();
            client
                .expect_set_stairs_group_size()
                .with(eq(9))
                .never();

            let out = run_with(client, "group 9\nquit\n").await;
            assert!(out.contains("error: failed to select group size 9"));
        }
    }
}
