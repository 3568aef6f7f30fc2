//! Built-in card decks — the guaranteed last resort of the sourcing pipeline.
//!
//! Every mode has a bundled deck so a draw can never come back empty, even
//! with no network, no generative provider, and no curated words.

use crate::catalog::Mode;
use crate::types::{Card, FillInBlankCard, TabooCard, TriviaCard};
use once_cell::sync::Lazy;
use rand::Rng;
use std::collections::{HashMap, HashSet};

fn plain(items: &[&str]) -> Vec<Card> {
    items.iter().map(|s| Card::Plain(s.to_string())).collect()
}

fn trivia(q: &str, a: &str, options: [&str; 4]) -> Card {
    Card::Trivia(TriviaCard {
        question: q.to_string(),
        correct_answer: a.to_string(),
        options: options.iter().map(|s| s.to_string()).collect(),
    })
}

fn fill_in_blank(verse: &str, answer: &str, reference: &str) -> Card {
    Card::FillInBlank(FillInBlankCard {
        verse: verse.to_string(),
        answer: answer.to_string(),
        reference: reference.to_string(),
    })
}

fn taboo(word: &str, forbidden: [&str; 5]) -> Card {
    Card::Taboo(TabooCard {
        word: word.to_string(),
        forbidden: forbidden.iter().map(|s| s.to_string()).collect(),
    })
}

static DECKS: Lazy<HashMap<Mode, Vec<Card>>> = Lazy::new(|| {
    let mut decks = HashMap::new();

    decks.insert(
        Mode::Sing,
        plain(&[
            "Amazing Grace",
            "How Great Thou Art",
            "Holy Spirit",
            "What a Friend We Have in Jesus",
            "10,000 Reasons",
            "Great Is Thy Faithfulness",
            "In Christ Alone",
            "Blessed Assurance",
            "Oceans",
            "Here I Am to Worship",
        ]),
    );

    decks.insert(
        Mode::Act,
        plain(&[
            "Noah and the Ark",
            "David and Goliath",
            "The Good Samaritan",
            "Jonah and the Whale",
            "Moses parting the Red Sea",
            "Daniel in the lions' den",
            "The Prodigal Son",
            "Walking on water",
            "Zacchaeus climbing the tree",
            "Feeding the five thousand",
        ]),
    );

    decks.insert(
        Mode::Explain,
        plain(&[
            "Faith",
            "Redemption",
            "Covenant",
            "Grace",
            "Repentance",
            "Sabbath",
            "Disciple",
            "Manna",
            "Parable",
            "Jubilee",
        ]),
    );

    decks.insert(
        Mode::Trivia,
        vec![
            trivia(
                "Who built the ark?",
                "Noah",
                ["Noah", "Moses", "Abraham", "David"],
            ),
            trivia(
                "How many books are in the New Testament?",
                "27",
                ["27", "39", "66", "12"],
            ),
            trivia(
                "What is the first book of the Bible?",
                "Genesis",
                ["Genesis", "Exodus", "Matthew", "John"],
            ),
            trivia(
                "Who was swallowed by a great fish?",
                "Jonah",
                ["Jonah", "Peter", "Elijah", "Paul"],
            ),
            trivia(
                "On which day did God rest?",
                "The seventh",
                ["The seventh", "The first", "The third", "The sixth"],
            ),
            trivia(
                "Who denied Jesus three times?",
                "Peter",
                ["Peter", "Judas", "Thomas", "John"],
            ),
            trivia(
                "What was Matthew's job before following Jesus?",
                "Tax collector",
                ["Tax collector", "Fisherman", "Carpenter", "Shepherd"],
            ),
            trivia(
                "How many plagues struck Egypt?",
                "10",
                ["10", "7", "12", "40"],
            ),
        ],
    );

    decks.insert(
        Mode::Hum,
        plain(&[
            "Amazing Grace",
            "How Great Thou Art",
            "It Is Well With My Soul",
            "Be Thou My Vision",
            "Joy to the World",
            "Silent Night",
            "Come Thou Fount of Every Blessing",
            "Nothing but the Blood",
            "The Old Rugged Cross",
            "Holy, Holy, Holy",
        ]),
    );

    decks.insert(
        Mode::WhoAmI,
        plain(&[
            "Moses", "David", "Paul", "Peter", "Esther", "Ruth", "Elijah", "Joseph", "Mary",
            "Samson", "Deborah", "Solomon",
        ]),
    );

    decks.insert(
        Mode::FillInBlank,
        vec![
            fill_in_blank(
                "For God so loved the world that he gave his one and only _____.",
                "Son",
                "John 3:16",
            ),
            fill_in_blank(
                "Trust in the _____ with all your heart.",
                "Lord",
                "Proverbs 3:5",
            ),
            fill_in_blank(
                "I can do all things through _____ who strengthens me.",
                "Christ",
                "Philippians 4:13",
            ),
            fill_in_blank("The Lord is my _____; I shall not want.", "shepherd", "Psalm 23:1"),
            fill_in_blank(
                "Your word is a _____ to my feet and a light to my path.",
                "lamp",
                "Psalm 119:105",
            ),
            fill_in_blank(
                "Be still, and know that I am _____.",
                "God",
                "Psalm 46:10",
            ),
            fill_in_blank(
                "Faith is the assurance of things _____ for.",
                "hoped",
                "Hebrews 11:1",
            ),
            fill_in_blank(
                "In the beginning was the _____.",
                "Word",
                "John 1:1",
            ),
        ],
    );

    decks.insert(
        Mode::Taboo,
        vec![
            taboo("Prayer", ["talk", "God", "ask", "church", "bless"]),
            taboo("Faith", ["believe", "trust", "hope", "God", "Jesus"]),
            taboo("Grace", ["mercy", "forgive", "God", "gift", "free"]),
            taboo("Baptism", ["water", "river", "John", "dunk", "church"]),
            taboo("Cross", ["Jesus", "wood", "crucify", "Calvary", "nail"]),
            taboo("Angel", ["wings", "heaven", "Gabriel", "messenger", "halo"]),
            taboo("Ark", ["Noah", "boat", "flood", "animals", "rain"]),
            taboo("Shepherd", ["sheep", "flock", "staff", "David", "pasture"]),
        ],
    );

    decks.insert(
        Mode::OneWord,
        plain(&[
            "Hope",
            "Mercy",
            "Salvation",
            "Peace",
            "Forgiveness",
            "Worship",
            "Eternity",
            "Blessing",
            "Miracle",
            "Glory",
        ]),
    );

    decks.insert(
        Mode::Draw,
        plain(&[
            "Noah's Ark",
            "The Cross",
            "The Good Shepherd",
            "Burning bush",
            "Jacob's ladder",
            "The empty tomb",
            "Crown of thorns",
            "Loaves and fishes",
            "The Garden of Eden",
            "Star of Bethlehem",
        ]),
    );

    decks
});

/// The full built-in deck for a mode.
pub fn deck(mode: Mode) -> &'static [Card] {
    DECKS
        .get(&mode)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Draw one card at random, preferring cards whose normalized key is not in
/// `excluded`. When exclusion would empty the pool, it is ignored for this
/// draw only — the deck never returns no card. An empty deck (which the
/// bundled data never has) falls back to the first Explain card.
pub fn draw(mode: Mode, excluded: &HashSet<String>, rng: &mut impl Rng) -> Card {
    let cards = deck(mode);
    if cards.is_empty() {
        return deck(Mode::Explain)
            .first()
            .cloned()
            .unwrap_or_else(|| Card::Plain("Faith".to_string()));
    }

    let fresh: Vec<&Card> = cards
        .iter()
        .filter(|c| !excluded.contains(&c.normalized_key()))
        .collect();
    if fresh.is_empty() {
        cards[rng.random_range(0..cards.len())].clone()
    } else {
        fresh[rng.random_range(0..fresh.len())].clone()
    }
}
