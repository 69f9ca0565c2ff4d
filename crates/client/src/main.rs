use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use larder_auth::ProfilePatch;
use larder_client::{
    AddOutcome, ClientConfig, ConsoleInteraction, Larder, MigrationReport, RestoreOutcome,
};
use larder_core::{IngredientId, UnitSystem};
use larder_pantry::{
    Category, Confidence, Detection, Ingredient, IngredientPatch, NewIngredient, Status,
};

#[derive(Parser)]
#[command(name = "larder", author, version, about = "Track what is in your fridge")]
struct Cli {
    /// Answer yes to every confirmation.
    #[arg(short, long, global = true)]
    yes: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an ingredient to the fridge
    Add {
        name: String,
        #[arg(short, long)]
        category: Option<Category>,
        #[arg(short, long)]
        expiry: Option<String>,
        #[arg(short, long)]
        status: Option<Status>,
    },
    /// List the fridge
    List,
    /// List the trash
    Trash,
    /// Move an ingredient (id or exact name) to the trash
    Remove { target: String },
    /// Bring an ingredient back from the trash
    Restore { target: String },
    /// Delete a trashed ingredient for good
    Purge { target: String },
    #[command(name = "clear-trash")]
    ClearTrash,
    /// Move everything in the fridge to the trash
    Clear,
    /// Change fields of an ingredient
    Update {
        target: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        category: Option<Category>,
        #[arg(short, long)]
        expiry: Option<String>,
        #[arg(short, long)]
        status: Option<Status>,
    },
    /// Confirm scanner detections, given as NAME or NAME:QUANTITY
    Scan { detections: Vec<String> },
    /// Manage the shopping list
    Shop {
        #[command(subcommand)]
        command: ShopCommands,
    },
    /// Suggest recipes from the fridge (or the given ingredients)
    Recipes {
        ingredients: Vec<String>,
        #[arg(long, default_value = "")]
        cravings: String,
    },
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "LARDER_PASSWORD")]
        password: String,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LARDER_PASSWORD")]
        password: String,
    },
    Logout,
    Whoami,
    /// Edit profile preferences
    Profile {
        #[arg(long)]
        name: Option<String>,
        /// Comma-separated dietary restrictions
        #[arg(long, value_delimiter = ',')]
        diet: Option<Vec<String>>,
        #[arg(long)]
        units: Option<UnitSystem>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        notifications: Option<bool>,
    },
    #[command(name = "reset-password")]
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    /// Change the signed-in user's password
    Passwd {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
}

#[derive(Subcommand)]
enum ShopCommands {
    Add { name: String },
    List,
    Toggle { target: String },
    Remove { target: String },
    /// Move checked entries into the fridge
    Stock,
}

fn resolve<'a, I>(target: &str, mut candidates: I) -> Option<IngredientId>
where
    I: Iterator<Item = (&'a IngredientId, &'a str)> + Clone,
{
    candidates
        .clone()
        .find(|(id, _)| id.as_str() == target)
        .or_else(|| candidates.find(|(_, name)| *name == target))
        .map(|(id, _)| id.clone())
}

fn print_ingredient(item: &Ingredient) {
    println!(
        "{}  {:<24} {:<8} {:<12} {}",
        item.id, item.name, item.category, item.expiry, item.status
    );
}

fn print_migration(report: &Option<MigrationReport>) {
    if let Some(report) = report {
        if !report.is_empty() {
            println!(
                "Moved {} local item(s) to the cloud ({} already there, {} kept locally)",
                report.created, report.skipped, report.retained
            );
        }
    }
}

fn parse_detection(raw: &str) -> anyhow::Result<Detection> {
    let (name, quantity) = match raw.rsplit_once(':') {
        Some((name, qty)) => (
            name,
            qty.trim()
                .parse::<u32>()
                .with_context(|| format!("invalid quantity in {raw:?}"))?,
        ),
        None => (raw, 1),
    };
    Ok(Detection::new(name.trim(), quantity, Confidence::High))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    larder_observability::init();
    let cli = Cli::parse();

    let config = ClientConfig::from_env()?;
    let interaction = Arc::new(ConsoleInteraction::new(cli.yes));
    let mut app = Larder::from_config(&config, interaction).await?;

    match cli.command {
        Commands::Add {
            name,
            category,
            expiry,
            status,
        } => {
            let category = category.unwrap_or_else(|| Category::classify(&name));
            let mut new = NewIngredient::new(name, category);
            new.expiry = expiry;
            new.status = status;
            match app.pantry_mut().add(new).await? {
                AddOutcome::Added(id) => println!("Added {id}"),
                AddOutcome::Skipped(reason) => println!("Nothing added ({reason:?})"),
            }
        }
        Commands::List => {
            for item in app.pantry().ingredients() {
                print_ingredient(&item);
            }
        }
        Commands::Trash => {
            for item in app.pantry().trash() {
                print_ingredient(&item.ingredient);
            }
        }
        Commands::Remove { target } => {
            let items = app.pantry().ingredients();
            let Some(id) = resolve(&target, items.iter().map(|i| (&i.id, i.name.as_str()))) else {
                bail!("{target:?} is not in the fridge");
            };
            app.pantry_mut().remove(&id).await?;
            println!("Moved {id} to the trash");
        }
        Commands::Restore { target } => {
            let trash = app.pantry().trash();
            let Some(id) = resolve(&target, trash.iter().map(|t| (&t.ingredient.id, t.name()))) else {
                bail!("{target:?} is not in the trash");
            };
            match app.pantry_mut().restore(&id).await? {
                RestoreOutcome::Restored => println!("Restored {id}"),
                RestoreOutcome::Declined => println!("Left {id} in the trash"),
                RestoreOutcome::NotFound => bail!("{target:?} is not in the trash"),
            }
        }
        Commands::Purge { target } => {
            let trash = app.pantry().trash();
            let Some(id) = resolve(&target, trash.iter().map(|t| (&t.ingredient.id, t.name()))) else {
                bail!("{target:?} is not in the trash");
            };
            app.pantry_mut().permanently_delete(&id).await?;
            println!("Deleted {id}");
        }
        Commands::ClearTrash => {
            let report = app.pantry_mut().clear_trash().await?;
            println!("Deleted {} item(s)", report.removed);
            if !report.failed.is_empty() {
                bail!("{} item(s) are still in the trash", report.failed.len());
            }
        }
        Commands::Clear => {
            let moved = app.pantry_mut().clear_pantry().await?;
            println!("Moved {moved} item(s) to the trash");
        }
        Commands::Update {
            target,
            name,
            category,
            expiry,
            status,
        } => {
            let items = app.pantry().ingredients();
            let Some(id) = resolve(&target, items.iter().map(|i| (&i.id, i.name.as_str()))) else {
                bail!("{target:?} is not in the fridge");
            };
            let patch = IngredientPatch {
                name,
                category,
                expiry,
                status,
            };
            app.pantry_mut().update(&id, &patch).await?;
            println!("Updated {id}");
        }
        Commands::Scan { detections } => {
            let detections = detections
                .iter()
                .map(|d| parse_detection(d))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let report = app.pantry_mut().add_all(Detection::confirmed(&detections)).await;
            println!(
                "Added {} item(s), {} already in the fridge",
                report.added.len(),
                report.skipped
            );
        }
        Commands::Shop { command } => match command {
            ShopCommands::Add { name } => match app.pantry_mut().shop_add(&name).await? {
                Some(item) => println!("{}  {} ({})", item.id, item.name, item.category),
                None => println!("Nothing added"),
            },
            ShopCommands::List => {
                for item in app.pantry().shopping().items() {
                    let mark = if item.checked { "x" } else { " " };
                    println!("[{mark}] {}  {:<24} {}", item.id, item.name, item.category);
                }
            }
            ShopCommands::Toggle { target } => {
                let items = app.pantry().shopping().items().to_vec();
                let Some(id) = resolve(&target, items.iter().map(|i| (&i.id, i.name.as_str()))) else {
                    bail!("{target:?} is not on the shopping list");
                };
                app.pantry_mut().shop_toggle(&id).await?;
            }
            ShopCommands::Remove { target } => {
                let items = app.pantry().shopping().items().to_vec();
                let Some(id) = resolve(&target, items.iter().map(|i| (&i.id, i.name.as_str()))) else {
                    bail!("{target:?} is not on the shopping list");
                };
                app.pantry_mut().shop_remove(&id).await?;
            }
            ShopCommands::Stock => {
                let report = app.pantry_mut().stock_fridge().await?;
                println!("Stocked {} item(s)", report.added.len());
            }
        },
        Commands::Recipes {
            ingredients,
            cravings,
        } => {
            let selected = if ingredients.is_empty() {
                app.pantry().ingredients().into_iter().map(|i| i.name).collect()
            } else {
                ingredients
            };
            let recipes = app.recipes(selected, &cravings).await;
            println!("{}", serde_json::to_string_pretty(&recipes)?);
        }
        Commands::Signup {
            name,
            email,
            password,
        } => {
            let (user, report) = app.sign_up(&name, &email, &password).await?;
            println!("Welcome, {}", user.name);
            print_migration(&report);
        }
        Commands::Login { email, password } => {
            let (user, report) = app.log_in(&email, &password).await?;
            println!("Signed in as {}", user.name);
            print_migration(&report);
        }
        Commands::Logout => {
            app.log_out().await?;
            println!("Signed out");
        }
        Commands::Whoami => match app.auth().current_user() {
            Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
            None => println!("Not signed in"),
        },
        Commands::Profile {
            name,
            diet,
            units,
            language,
            notifications,
        } => {
            let patch = ProfilePatch {
                name,
                dietary_restrictions: diet,
                unit_system: units,
                notifications_enabled: notifications,
                language,
            };
            app.update_profile(patch).await?;
            println!("Profile saved");
        }
        Commands::ResetPassword { email } => {
            app.auth().reset_password(&email).await?;
            println!("Password reset requested for {email}");
        }
        Commands::Passwd { current, new } => {
            app.auth().change_password(&current, &new).await?;
            println!("Password changed");
        }
    }

    Ok(())
}
