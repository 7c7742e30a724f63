use crate::{
    client,
    opt::{FetchArgs, ImagePart, ResetItem, ShowKind},
    setter, AppState, Config,
};

use anyhow::anyhow;
use reqwest::Client;

/// Get one image, keep it, and make it the wallpaper
pub async fn fetch_and_set(config: &Config, args: FetchArgs) -> anyhow::Result<()> {
    super::ensure_project_dirs_exist(&config.project)?;

    let client = Client::new();
    let image_data = client::fetch_image_data(config, &client).await?;
    let image = image_data
        .nth_newest(args.days_ago())
        .ok_or_else(|| anyhow!("No images returned from {}", config.to_url()))?
        .clone();
    log::info!("{}: {}", image.file_name(config)?.display(), image.title);

    let image_path = client::download_image(config, &client, &image, args.overwrite).await?;

    let mut state = AppState::load(config)?;
    state.current_image = Some(image.file_name(config)?);
    if args.metadata {
        println!("{}", serde_json::to_string_pretty(&image)?);
    }
    state.image_data.add_image(image);
    state.save(config)?;

    if !args.no_set {
        setter::set_wallpaper(config, &image_path)?;
    }

    println!("{}", image_path.display());
    Ok(())
}

pub fn print_project_dirs(config: &Config) -> Result<(), anyhow::Error> {
    let value = &config.project;
    let contents = serde_json::to_string_pretty(&value)?;
    println!("{contents}");
    Ok(())
}

pub fn list_images(
    config: &Config,
    format: &[ImagePart],
    all: bool,
    date: Option<&str>,
) -> anyhow::Result<()> {
    let date_format = |datetime: &jiff::Zoned| -> anyhow::Result<String> {
        match date {
            Some(f) => Ok(jiff::fmt::strtime::format(f, datetime)?),
            None => Ok(datetime.to_string()),
        }
    };

    let state = AppState::load(config)?;
    if state.image_data.images.is_empty() {
        anyhow::bail!("No images found. Try running with the \"update\" subcommand.");
    }

    let order = if all || format.is_empty() {
        ImagePart::all()
    } else {
        format.to_vec()
    };

    for image in &state.image_data.images {
        let mut line: Vec<String> = vec![];
        for item in &order {
            match item {
                ImagePart::Path => {
                    line.push(image.file_name(config)?.display().to_string());
                }
                ImagePart::FullPath => {
                    line.push(image.absolute_file_name(config)?.display().to_string());
                }
                ImagePart::Title => line.push(image.title.clone()),
                ImagePart::Url => line.push(image.to_url(config)?.to_string()),
                ImagePart::Time => line.push(date_format(&image.full_start_date)?),
                ImagePart::Current => line.push(state.is_current(image).to_string()),
                ImagePart::Copyright => line.push(image.copyright.clone()),
            }
        }

        println!("{}", line.join("\t"));
    }

    Ok(())
}

pub async fn print_metadata(
    config: &Config,
    show_url: bool,
    raw: bool,
    frozen: bool,
) -> anyhow::Result<()> {
    if frozen {
        let state = AppState::load(config)?;
        let contents = serde_json::to_string_pretty(&state)?;
        println!("{contents}");
    } else {
        let url = config.to_url();
        if show_url {
            println!("{url}");
        } else {
            let client = Client::new();
            let contents = if raw {
                serde_json::to_string_pretty(&client::fetch_raw(&client, url).await?)?
            } else {
                serde_json::to_string_pretty(&client::fetch_image_data(config, &client).await?)?
            };

            println!("{contents}");
        }
    }

    Ok(())
}

pub async fn update_images(config: &Config, quiet: bool) -> anyhow::Result<()> {
    super::ensure_project_dirs_exist(&config.project)?;

    let mut state = AppState::load(config)?;

    let client = Client::new();
    let new_image_data = client::fetch_image_data(config, &client).await?;
    let added =
        client::sync_images(config, &client, &mut state.image_data, new_image_data, quiet).await?;
    log::info!("{added} new images");

    let _ = state.pick_random(config)?;
    state.save(config)?;

    Ok(())
}

/// Resolve an image from the local index to a path in the data directory
///
/// `Random` always picks a new current image; it's only saved when `save` is set.
fn resolve(
    config: &Config,
    state: &mut AppState,
    kind: ShowKind,
    save: bool,
) -> anyhow::Result<std::path::PathBuf> {
    let file_name = match kind {
        ShowKind::Current => state
            .current_image
            .clone()
            .ok_or_else(|| anyhow!("No current image set"))?,
        ShowKind::Latest => state
            .latest()
            .ok_or_else(|| anyhow!("No images found. Try running with the \"update\" subcommand."))?
            .file_name(config)?,
        ShowKind::Random => {
            let file_name = state.pick_random(config)?;
            if save {
                state.save(config)?;
            }
            file_name
        }
    };

    Ok(config.project.data_dir.join(file_name))
}

pub fn show(config: &Config, kind: ShowKind, update: bool) -> anyhow::Result<()> {
    let mut state = AppState::load(config)?;
    let path = resolve(config, &mut state, kind, update)?;
    println!("{}", path.display());
    Ok(())
}

pub fn apply(config: &Config, kind: ShowKind) -> anyhow::Result<()> {
    let mut state = AppState::load(config)?;
    let path = resolve(config, &mut state, kind, false)?;

    setter::set_wallpaper(config, &path)?;

    if let Some(file_name) = path.file_name() {
        state.current_image = Some(file_name.into());
        state.save(config)?;
    }

    println!("{}", path.display());
    Ok(())
}

pub fn reset(config: &Config, all: bool, dry_run: bool, items: &[ResetItem]) -> anyhow::Result<()> {
    if all || items.contains(&ResetItem::Images) {
        let dir = &config.project.data_dir;
        if dry_run {
            let count = if dir.try_exists()? {
                Some(dir.read_dir()?.count())
            } else {
                None
            };

            let count_str = match count {
                Some(1) => " (1 file)".to_string(),
                Some(x) => format!(" ({x} files)"),
                None => String::new(),
            };
            eprintln!("[DRY RUN]: Removing {:?}{count_str}...", dir.display());
        } else if dir.try_exists()? {
            log::info!("Removing {}", dir.display());
            std::fs::remove_dir_all(dir)?;
        }
    }

    if all || items.contains(&ResetItem::State) {
        let state_dir = config
            .project
            .state_file_path
            .parent()
            .ok_or_else(|| anyhow!("The state file path is not inside a directory"))?;
        if dry_run {
            eprintln!("[DRY RUN]: Removing {:?}...", state_dir.display());
        } else if state_dir.try_exists()? {
            log::info!("Removing {}", state_dir.display());
            std::fs::remove_dir_all(state_dir)?;
        }
    }

    Ok(())
}
