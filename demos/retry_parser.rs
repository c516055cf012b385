//! Recover a structured answer from a deliberately malformed reply.
//!
//! The last assistant turn below stands in for a bad model response: it has a
//! mismatched `<items>` tag and an unclosed `</name`. [`RetryParser`] shows
//! the model the decode error and asks it to try again.
//!
//! Run with: `ANTHROPIC_API_KEY=... cargo run --example retry_parser`

use std::sync::Arc;

use llm_harness::conversation::{Conversation, Turn};
use llm_harness::decode::{xml, Decode, DecodeError};
use llm_harness::events::{Event, FnEventHandler};
use llm_harness::logging::{init_logging, LogLevel};
use llm_harness::{Client, RetryConfig, RetryParser, Settings};
use serde::Deserialize;

const XML_PREFIX: &str = "<shopping-list>";

const MALFORMED: &str = "<shopping-list>
  <item>
    <name>extra-sharp Cheddar</name>
    <quantity>8 ounces</quantity>
  </item>
  <item>
    <name>cream cheese</name>
    <quantity>1/4 cup (2 ounces)</quantity>
  </item>
  <items>
    <name>mayonnaise</name>
    <quantity>3 tablespoons</quantity>
  </item>
  <item>
    <name>black pepper</name
    <quantity>to taste</quantity>
  </item>
</shopping-list>";

#[derive(Debug, Deserialize)]
struct Item {
    name: String,
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct ShoppingList {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

impl Decode for ShoppingList {
    fn decode(text: &str) -> Result<Self, DecodeError> {
        xml::from_markup_rooted(text, "shopping-list")
    }
}

fn conversation() -> Conversation {
    Conversation::new()
        .with(Turn::human(
            "I would like a shopping list for a pimento cheese recipe: 8 ounces extra-sharp \
Cheddar, 1/4 cup cream cheese, 3 tablespoons mayonnaise, black pepper to taste.

Output each item and its quantity in the following format:

<shopping-list>
  <item>
    <name>item name</name>
    <quantity>item quantity</quantity>
  </item>
</shopping-list>",
        ))
        .with(Turn::assistant(MALFORMED))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LogLevel::Info);
    let settings = Settings::from_env()?;
    let client = Client::new(settings.api_key.clone(), settings.client_config())?;

    let parser = RetryParser::<ShoppingList>::new(RetryConfig::default()).with_event_handler(
        Arc::new(FnEventHandler(|event: Event| {
            if let Event::DecodeFailed { attempt, error, .. } = event {
                eprintln!("attempt {} did not decode: {}", attempt, error);
            }
        })),
    );

    let mut convo = conversation();
    let parsed = parser.parse_detailed(&client, &mut convo, XML_PREFIX).await?;

    println!("decoded after {} attempt(s), {} turns", parsed.attempts, convo.len());
    for item in &parsed.value.items {
        println!("Item: {} \n\t{}", item.name, item.quantity);
    }
    Ok(())
}
