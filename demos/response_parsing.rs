//! Ask for a shopping list as markup and decode the single reply.
//!
//! The assistant turn is pre-seeded with `<shopping-list>`, so the model only
//! generates the continuation and the prefix is glued back on before
//! decoding.
//!
//! Run with: `ANTHROPIC_API_KEY=... cargo run --example response_parsing`

use llm_harness::conversation::{Conversation, Turn};
use llm_harness::decode::xml;
use llm_harness::logging::{init_logging, LogLevel};
use llm_harness::{Client, Settings};
use serde::Deserialize;

const XML_PREFIX: &str = "<shopping-list>";

const RECIPE: &str = "INGREDIENTS
Yield: About 1.5 cups, enough for 4 sandwiches
8 ounces extra-sharp Cheddar, grated
1/4 cup softened cream cheese (2 ounces), pulled into several pieces
Scant 1/2 cup jarred pimento or other roasted red peppers, finely diced
3 tablespoons high-quality store-bought mayonnaise
1/2 teaspoon red-pepper flakes
Salt and black pepper to taste

PREPARATION
Place the Cheddar in a large bowl. Scatter the remaining ingredients over it and
mix with a spatula until smooth and spreadable. Refrigerate for up to 1 week.";

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

fn conversation() -> Conversation {
    Conversation::new()
        .with(Turn::human(
            "I have been given a recipe for which I would like to generate a shopping list \
of the items I'd need to buy in order to prepare it.

Output each item and the quantity I would need in the following format:

<shopping-list>
  <item>
    <name>item name</name>
    <quantity>item quantity</quantity>
  </item>
</shopping-list>

Do you understand the task and output structure? I will provide the recipe once you confirm.",
        ))
        .with(Turn::assistant(
            "Yes, I understand the task and output structure. Please provide the recipe.",
        ))
        .with(Turn::human(format!(
            "The recipe is below:\n\n<recipe>\n{}\n</recipe>",
            RECIPE
        )))
        .with(Turn::assistant(XML_PREFIX))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LogLevel::Info);
    let settings = Settings::from_env()?;
    let client = Client::new(settings.api_key.clone(), settings.client_config())?;

    let mut convo = conversation();
    let reply = client.complete(&convo, 500, 0.0, None).await?;
    convo.extend_last(&reply.text);

    let document = convo.last().map(|t| t.text.as_str()).unwrap_or_default();
    let list: ShoppingList = xml::from_markup_rooted(document, "shopping-list")?;

    for item in &list.items {
        println!("Item: {} \n\t{}", item.name, item.quantity);
    }
    Ok(())
}
