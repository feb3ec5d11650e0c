// src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::signal;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use osim_console::affects::columns::cell_value;
use osim_console::affects::table::AffectsTable;
use osim_console::models::flaw::Flaw;
use osim_console::osidb::api::OsidbApi;
use osim_console::osidb::client::OsidbClient;
use osim_console::settings::{self, UserSettings};
use osim_console::toast::ToastStore;
use osim_console::trackers::coordinator::TrackerCoordinator;
use osim_console::utils;

const REFRESH_INTERVAL: Duration = Duration::from_secs(300);

struct App {
	client: Arc<OsidbClient>,
	toasts: Arc<ToastStore>,
	settings_path: PathBuf,
	settings: UserSettings,
	shutdown_signal: tokio::sync::broadcast::Sender<()>,
}

impl App {
	fn new() -> Result<Self> {
		utils::logger::init();
		info!("Starting OSIM flaw management console");

		let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
		let client = Arc::new(OsidbClient::from_env().context("Failed to create OSIDB client")?);
		let settings_path = settings::default_path()?;
		let settings = UserSettings::load(&settings_path);

		Ok(App {
			client,
			toasts: Arc::new(ToastStore::new()),
			settings_path,
			settings,
			shutdown_signal: shutdown_tx,
		})
	}

	async fn run(&self, flaw_ref: &str) -> Result<()> {
		let flaw = self
			.client
			.get_flaw(flaw_ref)
			.await
			.with_context(|| format!("Failed to load flaw {flaw_ref}"))?;
		info!(
			"Loaded flaw {} ({} affects)",
			flaw.label(),
			flaw.affects.len()
		);

		let mut table = AffectsTable::new(
			self.client.clone(),
			self.toasts.clone(),
			self.settings.clone(),
		);
		table.initialize(&flaw);

		let mut coordinator = TrackerCoordinator::new(
			self.client.clone(),
			vec![flaw.uuid],
			flaw.affects.clone(),
		);
		coordinator.load().await;
		let untrackable = coordinator.untrackable_affects();
		if !untrackable.is_empty() {
			let pairs: Vec<String> = untrackable
				.iter()
				.map(|a| format!("{}/{}", a.ps_module, a.ps_component))
				.collect();
			warn!("No trackable update stream for: {}", pairs.join(", "));
		}

		self.print_page(&flaw, &table);
		self.start_refresh_scheduler(flaw.uuid);

		let mut shutdown_rx = self.shutdown_signal.subscribe();
		let shutdown_signal = self.shutdown_signal.clone();
		tokio::spawn(async move {
			match signal::ctrl_c().await {
				Ok(()) => {
					info!("Received Ctrl+C signal");
					let _ = shutdown_signal.send(());
				}
				Err(err) => {
					error!("Failed to listen for ctrl-c signal: {err}");
				}
			}
		});

		let _ = shutdown_rx.recv().await;
		info!("Received shutdown signal, closing console");

		if let Err(err) = table.settings().save(&self.settings_path) {
			warn!("Could not persist settings: {err:#}");
		}
		Ok(())
	}

	fn print_page(&self, flaw: &Flaw, table: &AffectsTable<OsidbClient>) {
		println!(
			"{} — {} ({} affects, page {}/{})",
			flaw.label(),
			flaw.title,
			table.filtered_count(),
			table.current_page() + 1,
			table.total_pages().max(1),
		);
		for affect in table.visible_rows() {
			let flags = table.row_flags(affect);
			let marker = if flags.is_removed {
				'-'
			} else if flags.is_new {
				'+'
			} else if flags.is_modified {
				'~'
			} else {
				' '
			};
			let cells: Vec<String> = table
				.columns()
				.iter()
				.filter(|def| table.settings().is_column_visible(def.id))
				.map(|def| cell_value(affect, def.id))
				.collect();
			println!("{marker} {}", cells.join(" | "));
		}

		for toast in self.toasts.drain() {
			println!("[{:?}] {}: {}", toast.css, toast.title, toast.body);
		}
	}

	fn start_refresh_scheduler(&self, flaw_uuid: Uuid) {
		let client = self.client.clone();
		let mut shutdown_rx = self.shutdown_signal.subscribe();

		tokio::spawn(async move {
			loop {
				tokio::select! {
					_ = sleep(REFRESH_INTERVAL) => {
						match client.get_flaw(&flaw_uuid.to_string()).await {
							Ok(flaw) => info!(
								"Background refresh: flaw {} now has {} affects",
								flaw.label(),
								flaw.affects.len()
							),
							Err(err) => error!("Background refresh failed: {err}"),
						}
					}
					_ = shutdown_rx.recv() => {
						info!("Refresh scheduler received shutdown signal");
						break;
					}
				}
			}
		});
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let app = App::new()?;
	let flaw_ref = std::env::args()
		.nth(1)
		.context("Usage: osim-console <flaw uuid or CVE id>")?;
	app.run(&flaw_ref).await
}
