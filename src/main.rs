// Interactive console explorer.
//
// - Option [1] loads the purchase export and the commodity hierarchy.
// - Option [2] switches between country, region and municipality scope.
// - Options [3] and [4] drill down and jump back along the breadcrumbs.
// - Option [5] exports the displayed level (treemap JSON, diagram JSON and
//   legend CSV).
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use futures::executor::block_on;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use sobreprecio::config::ExplorerConfig;
use sobreprecio::controller::{DrillStart, NavigationController, PendingFetch};
use sobreprecio::loader;
use sobreprecio::output;
use sobreprecio::sankey::{breadcrumb_trail, legend_helper_text, to_sankey};
use sobreprecio::scale::Palette;
use sobreprecio::util::{format_clp, format_int, format_percent};
use sobreprecio::{layout, DrillOutcome, PurchaseSource, Result};

struct Session {
    source: Arc<PurchaseSource>,
    controller: NavigationController<PurchaseSource>,
}

struct App {
    config: ExplorerConfig,
    palette: Palette,
    session: Option<Session>,
}

/// Read a single line of input after printing `prompt`.
fn prompt(prompt: &str) -> String {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    prompt("Enter choice: ")
}

/// Read a 1-based menu index; `None` for blank or invalid input.
fn read_index(len: usize) -> Option<usize> {
    let choice = read_choice();
    if choice.is_empty() {
        return None;
    }
    match choice.parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Some(n - 1),
        _ => {
            println!("Invalid choice. Please enter a number between 1 and {len}.\n");
            None
        }
    }
}

fn init_logging() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).with_target(false).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("logging already initialised");
    }
}

impl App {
    fn new(config: ExplorerConfig) -> Result<Self> {
        let palette = config.colors.palette()?;
        Ok(Self {
            config,
            palette,
            session: None,
        })
    }

    fn session(&mut self) -> Option<&mut Session> {
        if self.session.is_none() {
            println!("Error: No data loaded. Please load the data first (option 1).\n");
        }
        self.session.as_mut()
    }

    /// Option [1]: load both CSV files and open the country level.
    fn handle_load(&mut self) {
        let data = &self.config.data;
        let loaded = loader::load_purchases(&data.purchases)
            .and_then(|p| loader::load_hierarchy(&data.hierarchy).map(|h| (p, h)));
        let ((purchases, purchase_report), (index, hierarchy_report)) = match loaded {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Failed to load data: {}\n", e);
                return;
            }
        };
        println!(
            "Processing dataset... ({} purchases loaded of {} rows)",
            format_int(purchase_report.loaded_rows as u64),
            format_int(purchase_report.total_rows as u64)
        );
        println!(
            "Note: {} rows skipped due to parse/validation errors, {} from associations, {} with unknown region.",
            format_int(purchase_report.parse_errors as u64),
            format_int(purchase_report.associations as u64),
            format_int(purchase_report.unknown_regions as u64)
        );
        println!(
            "Commodity hierarchy: {} commodities ({} without category).\n",
            format_int(hierarchy_report.commodities as u64),
            format_int(hierarchy_report.without_category as u64)
        );

        let source = Arc::new(PurchaseSource::new(
            purchases,
            index,
            data.country.clone(),
            data.top_level,
        ));
        match block_on(NavigationController::open(Arc::clone(&source))) {
            Ok(controller) => {
                self.session = Some(Session { source, controller });
                self.show_level();
            }
            Err(e) => eprintln!("Failed to open country level: {}\n", e),
        }
    }

    /// Option [2]: change geographic scope.
    fn handle_scope(&mut self) {
        let Some(session) = self.session() else {
            return;
        };
        println!("[1] Country");
        println!("[2] Region");
        println!("[3] Municipality of the selected region");
        println!("[4] Back one level\n");
        let fetch = match read_choice().as_str() {
            "1" => session.controller.back_to_country(),
            "2" => {
                let regions = session.source.regions();
                for (i, r) in regions.iter().enumerate() {
                    println!("[{}] {}", i + 1, r.name);
                }
                let Some(i) = read_index(regions.len()) else {
                    return;
                };
                session.controller.select_region(regions[i].clone())
            }
            "3" => {
                let Some(region) = session.controller.view().selected_region.clone() else {
                    println!("Select a region first.\n");
                    return;
                };
                let municipalities = session.source.municipalities(region.code);
                for (i, m) in municipalities.iter().enumerate() {
                    println!("[{}] {}", i + 1, m.name);
                }
                let Some(i) = read_index(municipalities.len()) else {
                    return;
                };
                session.controller.select_municipality(municipalities[i].clone())
            }
            "4" => session.controller.back(),
            _ => {
                println!("Invalid choice. Please enter 1 to 4.\n");
                return;
            }
        };
        if let Some(fetch) = fetch {
            let outcome = run_fetch(&mut session.controller, fetch);
            report_outcome(&outcome);
        }
        self.show_level();
    }

    /// Option [3]: drill into one of the displayed nodes.
    fn handle_drill(&mut self) {
        let Some(session) = self.session() else {
            return;
        };
        let children = session.controller.state().data().children.clone();
        if children.is_empty() {
            println!("Nothing to drill into at this level.\n");
            return;
        }
        for (i, c) in children.iter().enumerate() {
            let marker = if c.is_terminal() { "" } else { " >" };
            println!("[{}] {} ({}){}", i + 1, c.name, format_clp(c.value), marker);
        }
        let Some(i) = read_index(children.len()) else {
            return;
        };
        let outcome = match session.controller.request_drill_down(&children[i]) {
            DrillStart::Ready(outcome) => outcome,
            DrillStart::Pending(fetch) => run_fetch(&mut session.controller, fetch),
        };
        report_outcome(&outcome);
        self.show_level();
    }

    /// Option [4]: jump back to a breadcrumb.
    fn handle_breadcrumb(&mut self) {
        let Some(session) = self.session() else {
            return;
        };
        let crumbs = session.controller.state().breadcrumbs();
        for (i, b) in crumbs.iter().enumerate() {
            println!("[{}] {} ({})", i + 1, b.name, b.level_label());
        }
        let Some(i) = read_index(crumbs.len()) else {
            return;
        };
        if !session.controller.breadcrumb_click(i) {
            println!("Already at that level.\n");
        }
        self.show_level();
    }

    /// Option [5]: write the displayed level to the output directory.
    fn handle_export(&mut self) {
        let (width, height) = (self.config.layout.width, self.config.layout.height);
        let geometry = self.config.layout.geometry;
        let output_dir = self.config.data.output_dir.clone();
        let Some(session) = self.session() else {
            return;
        };
        let state = session.controller.state();
        let data = to_sankey(state.data());
        let Some(computed) = layout(&data, width, height, &geometry) else {
            println!("Layout width must be positive; check [layout] width.\n");
            return;
        };
        let stem = output::file_stem(&breadcrumb_trail(state.breadcrumbs()));
        match output::export_snapshot(&output_dir, &stem, state.data(), &data, &computed) {
            Ok(files) => {
                println!("Outputs saved to:");
                println!("  {}", files.treemap.display());
                println!("  {}", files.layout.display());
                println!("  {}\n", files.legend.display());
            }
            Err(e) => eprintln!("Write error: {}\n", e),
        }
    }

    /// Print the breadcrumb trail, the helper text and the legend.
    fn show_level(&self) {
        let Some(session) = &self.session else {
            return;
        };
        let state = session.controller.state();
        let data = to_sankey(state.data());
        let rate = data.source().and_then(|s| s.overpricing_rate).unwrap_or(0.0);
        println!("\n{}", breadcrumb_trail(state.breadcrumbs()));
        println!(
            "Total {} | sobreprecio {}",
            format_clp(data.total_value()),
            format_percent(rate * 100.0)
        );
        println!("{}", legend_helper_text(state.child_level()));
        let rows = output::legend_rows(&data);
        output::preview_table(state.data().name.as_str(), None, &rows, 15);
        let scale = sobreprecio::ColorScale::for_data(&data, self.palette);
        let top = data.targets().next();
        if let Some(top) = top {
            println!("Largest: {} ({})\n", top.name, scale.node_fill(top));
        }
    }
}

/// Drive a fetch to completion and apply its response.
fn run_fetch(controller: &mut NavigationController<PurchaseSource>, fetch: PendingFetch) -> DrillOutcome {
    let response = block_on(fetch.wait());
    controller.deliver(response)
}

fn report_outcome(outcome: &DrillOutcome) {
    match outcome {
        DrillOutcome::Applied | DrillOutcome::Stale => {}
        DrillOutcome::Rejected => println!("That node cannot be drilled into.\n"),
        DrillOutcome::NoChildren => println!("No purchases below that node.\n"),
        DrillOutcome::Closed => println!("The view is closed.\n"),
        DrillOutcome::Failed(e) => {
            error!(%e, "data source failed");
            println!("Could not load data: {}\n", e);
        }
    }
}

fn main() {
    init_logging();
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match ExplorerConfig::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let mut app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    loop {
        println!("Sobreprecio explorer:");
        println!("[1] Load the data");
        println!("[2] Choose scope");
        println!("[3] Drill down");
        println!("[4] Jump to breadcrumb");
        println!("[5] Export snapshot");
        println!("[6] Exit\n");
        match read_choice().as_str() {
            "1" => app.handle_load(),
            "2" => app.handle_scope(),
            "3" => app.handle_drill(),
            "4" => app.handle_breadcrumb(),
            "5" => app.handle_export(),
            "6" => {
                if let Some(mut session) = app.session.take() {
                    session.controller.teardown();
                }
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1 to 6.\n"),
        }
    }
}
