use std::collections::BTreeSet;

use anyhow::{bail, Result};
use croquis_core::{
    records::{Deck, DeckFilter},
    store::RecordStore,
};
use croquis_library::{DeckLibrary, RecentDeckList};
use uuid::Uuid;

use crate::cli::{DeckCommand, FilterArgs};

/// Execute a deck subcommand against `store`.
pub fn handle<S: RecordStore>(cmd: DeckCommand, store: &S) -> Result<()> {
    let library = DeckLibrary::new(store);
    let recent = RecentDeckList::new(store);

    match cmd {
        DeckCommand::List => {
            let listing = library.list()?;
            if listing.decks.is_empty() && listing.failures.is_empty() {
                println!("No decks yet. Create one with `croquis deck create <name>`.");
                return Ok(());
            }
            for deck in recent_first(listing.decks, &recent.list()) {
                println!(
                    "{} {} ({} images)",
                    short_id(deck.id),
                    deck.name,
                    deck.images.len()
                );
            }
            for failure in listing.failures {
                eprintln!("! {} could not be read: {}", failure.file, failure.error);
            }
        }
        DeckCommand::Create { name } => {
            let deck = library.create(&name)?;
            recent.touch(deck.id)?;
            println!("Created deck {}: {}", deck.id, deck.name);
        }
        DeckCommand::Show { deck, session } => {
            let deck = resolve(&library, &deck)?;
            recent.touch(deck.id)?;
            print_deck(&deck);
            if session {
                println!("session order:");
                let order = deck.session_images(&mut rand::thread_rng());
                if order.is_empty() {
                    println!("  (no images pass the filter)");
                }
                for (n, image) in order.iter().enumerate() {
                    println!("  {:>3}. {}", n + 1, image.filename);
                }
            }
        }
        DeckCommand::Add {
            deck,
            images,
            difficulty,
            embed,
            tags,
        } => {
            let deck = resolve(&library, &deck)?;
            let tags: BTreeSet<String> = tags.into_iter().collect();
            for path in images {
                match library.import_image(deck.id, &path, difficulty, embed)? {
                    Some(image) => {
                        if !tags.is_empty() {
                            library.set_tags(deck.id, &image.filename, tags.clone())?;
                        }
                        println!(
                            "Added {} ({}x{})",
                            image.filename, image.width, image.height
                        );
                    }
                    None => println!("Skipped {}: already in deck", path.display()),
                }
            }
        }
        DeckCommand::Remove { deck, filename } => {
            let deck = resolve(&library, &deck)?;
            let removed = library.remove_image(deck.id, &filename)?;
            println!("Removed {} from {}", removed.filename, deck.name);
        }
        DeckCommand::Tag {
            deck,
            filename,
            tags,
        } => {
            let deck = resolve(&library, &deck)?;
            library.set_tags(deck.id, &filename, tags.into_iter().collect())?;
            println!("Tagged {filename}");
        }
        DeckCommand::Filter(args) => {
            let deck = resolve(&library, &args.deck)?;
            let updated = library.set_filter(deck.id, filter_from(args))?;
            print_filter(&updated.filter);
        }
        DeckCommand::Delete { deck } => {
            let deck = resolve(&library, &deck)?;
            library.delete(deck.id)?;
            recent.remove(deck.id)?;
            println!("Deleted deck {}", deck.name);
        }
    }

    Ok(())
}

/// Find a deck by full id, id prefix or case-insensitive name.
pub fn resolve<S: RecordStore>(library: &DeckLibrary<S>, reference: &str) -> Result<Deck> {
    let reference = reference.trim();
    if reference.is_empty() {
        bail!("deck reference is empty");
    }
    if let Ok(id) = Uuid::parse_str(reference) {
        return library.get(id);
    }
    let mut matches: Vec<Deck> = library
        .list()?
        .decks
        .into_iter()
        .filter(|deck| {
            deck.name.eq_ignore_ascii_case(reference)
                || deck.id.to_string().starts_with(&reference.to_ascii_lowercase())
        })
        .collect();
    match matches.len() {
        0 => bail!("no deck matches {reference:?}"),
        1 => Ok(matches.remove(0)),
        n => bail!("{n} decks match {reference:?}; use the full id"),
    }
}

fn filter_from(args: FilterArgs) -> DeckFilter {
    DeckFilter {
        enabled_tags: args.tags.into_iter().collect(),
        shuffle: args.shuffle.into(),
        max_difficulty: args.max_difficulty,
    }
}

fn recent_first(mut decks: Vec<Deck>, recent: &[Uuid]) -> Vec<Deck> {
    decks.sort_by_key(|deck| {
        recent
            .iter()
            .position(|id| *id == deck.id)
            .unwrap_or(usize::MAX)
    });
    decks
}

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn print_deck(deck: &Deck) {
    println!("{} {}", deck.id, deck.name);
    println!(
        "created {}  updated {}",
        deck.created_at.format("%Y-%m-%d %H:%M"),
        deck.updated_at.format("%Y-%m-%d %H:%M")
    );
    if deck.images.is_empty() {
        println!("(no images)");
    }
    for image in &deck.images {
        let mut line = format!(
            "  {}  {}x{}  difficulty {}",
            image.filename, image.width, image.height, image.difficulty
        );
        if !image.tags.is_empty() {
            let tags: Vec<&str> = image.tags.iter().map(String::as_str).collect();
            line.push_str(&format!("  tags: {}", tags.join(", ")));
        }
        if image.image_data.is_some() {
            line.push_str("  [embedded]");
        }
        println!("{line}");
    }
    print_filter(&deck.filter);
}

fn print_filter(filter: &DeckFilter) {
    let tags = if filter.enabled_tags.is_empty() {
        "all".to_string()
    } else {
        filter
            .enabled_tags
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let max = filter
        .max_difficulty
        .map_or("none".to_string(), |d| d.to_string());
    println!(
        "filter: tags {tags}; shuffle {:?}; max difficulty {max}",
        filter.shuffle
    );
}
