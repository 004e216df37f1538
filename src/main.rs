use firehose::config;
use firehose::err::FatalErr;
use firehose::event::Event;
use firehose::request::Params;
use firehose::Client;

fn main() -> Result<(), FatalErr> {
    config::merge_dotenv()?;
    pretty_env_logger::try_init()?;
    let cfg = config::from_env(dotenv::vars().collect())?;
    let track = dotenv::var("TRACK").ok();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let client = Client::new(cfg)?;
        let (_stream, mut events) = match track {
            Some(terms) => {
                log::info!("Tracking {}", terms);
                let mut params = Params::new();
                params.insert("track".to_string(), terms);
                client.public_stream(params)
            }
            None => client.sample_stream(Params::new()),
        };

        while let Some(event) = events.recv().await {
            match &event {
                Event::Data(_) => log::trace!("data"),
                Event::Message { message, for_user } => match for_user {
                    Some(user) => log::info!("{} for {}", message.name(), user),
                    None => log::info!("{}", message.name()),
                },
                Event::Error(e) => log::warn!("{}", e),
                Event::Retry { delay, .. } => log::info!("retrying in {:?}", delay),
                Event::Destroy => break,
                other => log::info!("{}", other.name()),
            }
        }
        Ok::<(), FatalErr>(())
    })
}
