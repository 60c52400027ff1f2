use clap::Parser;
use cli::{Cli, Command, EntryCommand};
use color_eyre::eyre::{self, WrapErr, bail};
use diary::{
    Applied, DiaryConfig, DiaryEntry, DirBlobStore, EmptyOutcome, EntryFilter, EntryWriter,
    ImageCache, LocalStore, PageStatus, RemoteStore, Row, SyncCoordinator,
    entries::{self, DATE_FORMAT},
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use time::{OffsetDateTime, PrimitiveDateTime};

mod cli;

const DIARY_FILE: &str = "diary.json";
const IMAGE_DIR: &str = "images";

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Command::New { name, user } => {
            let config = DiaryConfig::default();
            diary::logging::init(&config.log_filter)?;

            fs::create_dir(&name).wrap_err("Failed to create directory for diary")?;
            fs::create_dir(Path::new(&name).join(IMAGE_DIR))
                .wrap_err("Failed to create image directory")?;

            LocalStore::create(Path::new(&name).join(DIARY_FILE), Some(user))
                .wrap_err("Failed to create diary file")?;
            config
                .save(Path::new(&name))
                .wrap_err("Failed to save diary config")?;

            println!("Created diary {name}");
        }
        Command::Entry { entry_command } => {
            let diary = Diary::open()?;
            run_entry_command(&diary, entry_command).await?;
        }
        Command::Image { url } => {
            let diary = Diary::open()?;
            let cache = ImageCache::new(diary.blobs(), diary.config.image_cache_capacity);

            match cache.load(&url).await {
                Some(image) => println!("{url}: {}x{}", image.width(), image.height()),
                None => bail!("Could not load image {url}"),
            }
        }
    }

    Ok(())
}

/// A diary directory opened from the working directory.
struct Diary {
    config: DiaryConfig,
    store: Arc<LocalStore>,
    root: PathBuf,
}

impl Diary {
    fn open() -> eyre::Result<Self> {
        let root = PathBuf::from(".");

        let config = DiaryConfig::load(&root).wrap_err("Failed to read diary config")?;
        diary::logging::init(&config.log_filter)?;

        let store =
            LocalStore::open(root.join(DIARY_FILE)).wrap_err("Not inside a diary directory")?;

        Ok(Self {
            config,
            store: Arc::new(store),
            root,
        })
    }

    fn blobs(&self) -> DirBlobStore {
        DirBlobStore::new(self.root.join(IMAGE_DIR))
    }

    fn writer(&self) -> EntryWriter<LocalStore, DirBlobStore> {
        EntryWriter::new(Arc::clone(&self.store), Arc::new(self.blobs()))
    }

    async fn find(&self, id: &str, filter: EntryFilter) -> eyre::Result<DiaryEntry> {
        let entries = self
            .store
            .fetch_all(filter)
            .await
            .wrap_err("Failed to read entries")?;

        match entries.into_iter().find(|entry| entry.key() == Some(id)) {
            Some(entry) => Ok(entry),
            None => bail!("No {filter} entry with id {id}"),
        }
    }
}

async fn run_entry_command(diary: &Diary, command: EntryCommand) -> eyre::Result<()> {
    match command {
        EntryCommand::Add {
            title,
            content,
            date,
            emotion,
            weather,
            location,
            images,
        } => {
            let date_string = match date {
                Some(date) => {
                    PrimitiveDateTime::parse(&date, DATE_FORMAT)
                        .wrap_err_with(|| format!("Date {date:?} is not YYYY-MM-DD HH:MM:SS"))?;
                    date
                }
                None => {
                    let now = OffsetDateTime::now_local()
                        .unwrap_or_else(|_| OffsetDateTime::now_utc());
                    entries::format_date(PrimitiveDateTime::new(now.date(), now.time()))
                }
            };

            let images = images
                .iter()
                .map(|path| {
                    fs::read(path).wrap_err_with(|| format!("Failed to read {}", path.display()))
                })
                .collect::<eyre::Result<Vec<_>>>()?;

            let mut draft = DiaryEntry::new(title, content, date_string);
            draft.emotion = emotion;
            draft.weather = weather;
            draft.location = location;

            let stored = diary.writer().create(draft, images).await?;

            println!(
                "Created entry {} with {} image(s)",
                stored.key().unwrap_or_default(),
                stored.image_urls.len()
            );
        }
        EntryCommand::List { trash, images } => {
            let filter = if trash {
                let purged = diary
                    .writer()
                    .purge_expired(OffsetDateTime::now_utc(), diary.config.trash_retention())
                    .await?;
                if purged > 0 {
                    println!("Purged {purged} expired entr(y/ies) from the trash");
                }
                EntryFilter::Trash
            } else {
                EntryFilter::Active
            };

            let mut coordinator =
                SyncCoordinator::new(Arc::clone(&diary.store), filter, diary.config.page_size);
            coordinator.refresh();
            drain_pages(&mut coordinator).await?;

            let cache = images
                .then(|| ImageCache::new(diary.blobs(), diary.config.image_cache_capacity));
            print_sections(&coordinator, cache.as_ref()).await;
        }
        EntryCommand::Days => {
            let mut coordinator = SyncCoordinator::new(
                Arc::clone(&diary.store),
                EntryFilter::Active,
                diary.config.page_size,
            );
            coordinator.refresh();
            drain_pages(&mut coordinator).await?;

            for (month, days) in coordinator.index().active_days() {
                let days: Vec<String> = days.iter().map(u8::to_string).collect();
                println!("{month}: {} day(s) [{}]", days.len(), days.join(" "));
            }
        }
        EntryCommand::Search { query, trash } => {
            let filter = if trash {
                EntryFilter::Trash
            } else {
                EntryFilter::Active
            };

            let mut coordinator =
                SyncCoordinator::new(Arc::clone(&diary.store), filter, diary.config.page_size);
            coordinator.begin_search(query);

            while let Some(applied) = coordinator.pump().await {
                match applied {
                    Applied::Search { count } => {
                        println!("{count} match(es)");
                        break;
                    }
                    Applied::Failed(err) => return Err(err).wrap_err("Search failed"),
                    _ => {}
                }
            }

            print_sections(&coordinator, None).await;
        }
        EntryCommand::Trash { id } => {
            let entry = diary.find(&id, EntryFilter::Active).await?;
            diary
                .writer()
                .move_to_trash(&entry, OffsetDateTime::now_utc())
                .await?;
            println!("Moved {id} to the trash");
        }
        EntryCommand::Restore { id } => {
            let entry = diary.find(&id, EntryFilter::Trash).await?;
            diary.writer().restore(&entry).await?;
            println!("Restored {id}");
        }
        EntryCommand::RestoreAll => {
            let restored = diary.writer().restore_all().await?;
            println!("Restored {restored} entr(y/ies)");
        }
        EntryCommand::EmptyTrash => match diary.writer().empty_trash().await? {
            EmptyOutcome::AlreadyEmpty => println!("The trash is already empty"),
            EmptyOutcome::Emptied(count) => println!("Deleted {count} entr(y/ies)"),
        },
        EntryCommand::Purge => {
            let purged = diary
                .writer()
                .purge_expired(OffsetDateTime::now_utc(), diary.config.trash_retention())
                .await?;
            println!("Purged {purged} entr(y/ies)");
        }
    }

    Ok(())
}

/// Pulls pages until the filter is exhausted.
async fn drain_pages(coordinator: &mut SyncCoordinator<LocalStore>) -> eyre::Result<()> {
    while let Some(applied) = coordinator.pump().await {
        let status = match applied {
            Applied::Refreshed { status, .. } | Applied::Page { status, .. } => status,
            Applied::Failed(err) => return Err(err).wrap_err("Failed to load entries"),
            _ => continue,
        };

        match status {
            PageStatus::More => {
                coordinator.request_next_page();
            }
            PageStatus::Exhausted => break,
            PageStatus::Unauthenticated => bail!("Diary has no owner"),
        }
    }

    Ok(())
}

async fn print_sections(
    coordinator: &SyncCoordinator<LocalStore>,
    cache: Option<&ImageCache<DirBlobStore>>,
) {
    let snapshot = coordinator.snapshot();

    if let Some(cache) = cache {
        cache.prefetch(snapshot.cover_urls());
    }

    for section in &snapshot.sections {
        println!("{}", section.key);

        for row in &section.rows {
            let Row::Entry(entry) = row else {
                continue;
            };

            println!(
                "  {} ({}):\n\tdate: {}\n\tmood: {} / {}",
                entry.title,
                entry.key().unwrap_or_default(),
                entry.date_string,
                entry.emotion,
                entry.weather
            );

            if let Some(location) = &entry.location {
                println!("\tlocation: {location}");
            }

            if let (Some(cache), Some(url)) = (cache, entry.image_urls.first()) {
                match cache.load(url).await {
                    Some(image) => {
                        println!("\timage: {url} ({}x{})", image.width(), image.height())
                    }
                    None => println!("\timage: {url} (unavailable)"),
                }
            }
        }
    }
}
