use anyhow::{Context, Result};
use audiobook_organize::component::AudiobookOrganizer;
use audiobook_organize::config::load::{load_embedded_file_type_table, load_settings};
use audiobook_organize::config::{FieldMapping, Layout, OrganizerConfig, SeriesFormat};
use audiobook_organize::init;
use audiobook_organize::signal::setup_shutdown_signal;
use audiobook_organize::tools::validate_directory_exists;
use clap::Parser;
use console::style;
use dialoguer::Input;
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "audiobook_organize",
    about = "依中繼資料將有聲書整理成 作者/系列/書名 的目錄結構",
    version,
    long_about = None
)]
struct Cli {
    /// 要整理的資料夾；未指定時互動輸入
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_DIR")]
    dir: Option<PathBuf>,

    /// 輸出資料夾（預設為 --dir）
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_OUT")]
    out: Option<PathBuf>,

    /// author-only, author-title, author-series-title, series-title,
    /// author-series-title-number, series-title-number
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_LAYOUT")]
    layout: Option<String>,

    /// bracket 或 hash
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_SERIES_FORMAT")]
    series_format: Option<String>,

    #[arg(long, env = "AUDIOBOOK_ORGANIZER_SERIES_PADDING")]
    series_padding: Option<usize>,

    /// 以此字串取代路徑中的空白
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_REPLACE_SPACE")]
    replace_space: Option<String>,

    #[arg(short, long, env = "AUDIOBOOK_ORGANIZER_VERBOSE")]
    verbose: bool,

    /// 只列出預計的移動
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_DRY_RUN")]
    dry_run: bool,

    /// 依復原紀錄還原上次的整理
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_UNDO")]
    undo: bool,

    /// 每個移動前都先確認
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_PROMPT")]
    prompt: bool,

    /// 整理後刪除空資料夾
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_REMOVE_EMPTY")]
    remove_empty: bool,

    /// 逐檔讀取中繼資料並將音訊檔依專輯分組
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_FLAT")]
    flat: bool,

    /// 優先使用 EPUB / 音訊標籤，而非 metadata.json
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_USE_EMBEDDED_METADATA")]
    use_embedded_metadata: bool,

    /// 以專輯作為系列、演出者作為作者（之後的欄位參數仍可覆蓋）
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_ALBUM_AS_SERIES")]
    album_as_series: bool,

    #[arg(long, env = "AUDIOBOOK_ORGANIZER_TITLE_FIELD")]
    title_field: Option<String>,

    #[arg(long, env = "AUDIOBOOK_ORGANIZER_SERIES_FIELD")]
    series_field: Option<String>,

    /// 以逗號分隔，依序嘗試
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_AUTHOR_FIELDS", value_delimiter = ',')]
    author_fields: Option<Vec<String>>,

    #[arg(long, env = "AUDIOBOOK_ORGANIZER_TRACK_FIELD")]
    track_field: Option<String>,

    /// JSON 設定檔，命令列參數會覆蓋其中的值
    #[arg(long, env = "AUDIOBOOK_ORGANIZER_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self, base_dir: PathBuf) -> Result<OrganizerConfig> {
        let mut config = OrganizerConfig::new(base_dir, load_embedded_file_type_table()?);

        if let Some(path) = &self.config {
            let settings = load_settings(path)?;
            config.apply_settings(&settings);
        }

        if let Some(out) = self.out {
            config.output_dir = Some(out);
        }
        if let Some(layout) = &self.layout {
            config.layout = Layout::from_name(layout);
        }
        if let Some(format) = &self.series_format {
            config.series_format = SeriesFormat::from_name(format);
        }
        if let Some(padding) = self.series_padding {
            config.series_padding = padding;
        }
        if let Some(replace_space) = self.replace_space {
            config.replace_space = Some(replace_space);
        }

        config.verbose |= self.verbose;
        config.dry_run |= self.dry_run;
        config.undo |= self.undo;
        config.prompt |= self.prompt;
        config.remove_empty |= self.remove_empty;
        config.flat |= self.flat;
        config.use_embedded_metadata |= self.use_embedded_metadata;

        if self.album_as_series {
            config.field_mapping = FieldMapping::audio_album_as_series();
        }
        if let Some(field) = self.title_field {
            config.field_mapping.title_field = field;
        }
        if let Some(field) = self.series_field {
            config.field_mapping.series_field = field;
        }
        if let Some(fields) = self.author_fields {
            config.field_mapping.author_fields = fields;
        }
        if let Some(field) = self.track_field {
            config.field_mapping.track_field = field;
        }

        Ok(config)
    }
}

fn prompt_input_path() -> Result<PathBuf> {
    let path: String = Input::new()
        .with_prompt("請輸入要整理的資料夾路徑")
        .interact_text()?;
    let path = PathBuf::from(path.trim());
    validate_directory_exists(&path)?;
    Ok(path)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init::init(cli.verbose);
    let shutdown_signal = setup_shutdown_signal();

    let base_dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => prompt_input_path()?,
    };
    let config = cli.into_config(base_dir)?;
    info!(
        "目錄結構: {}，系列格式: {:?}",
        config.layout, config.series_format
    );
    if !config.field_mapping.is_default() {
        info!("欄位對應: {:?}", config.field_mapping);
    }

    let organizer = AudiobookOrganizer::new(config, shutdown_signal);
    match organizer.run() {
        Ok(summary) => {
            organizer.print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            warn!("整理中止: {e:#}");
            eprintln!("{} {e:#}", style("錯誤:").red().bold());
            Err(e).context("整理失敗")
        }
    }
}
