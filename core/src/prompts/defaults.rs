//! Built-in prompt templates. Operator overrides from the storefront admin
//! replace these id-by-id; the ids here are the universe the registry knows.

use super::PromptTemplate;

pub const INTENT_ANALYSIS: &str = "intent_analysis";
pub const PRODUCT_RANKING: &str = "product_ranking";
pub const MISSING_ITEM: &str = "missing_item";
pub const GENERAL_CHAT: &str = "general_chat";

pub fn default_prompts() -> Vec<PromptTemplate> {
    vec![
        PromptTemplate::builtin(
            INTENT_ANALYSIS,
            "Intent analysis",
            "Extracts structured shopping intent from a customer message",
            INTENT_ANALYSIS_TEMPLATE,
        ),
        PromptTemplate::builtin(
            PRODUCT_RANKING,
            "Product ranking and summary",
            "Ranks candidate products and writes the reply summary in one call",
            PRODUCT_RANKING_TEMPLATE,
        ),
        PromptTemplate::builtin(
            MISSING_ITEM,
            "Missing item decision",
            "Decides between logging a product request and asking for details",
            MISSING_ITEM_TEMPLATE,
        ),
        PromptTemplate::builtin(
            GENERAL_CHAT,
            "General chat",
            "Persona reply for greetings and small talk",
            GENERAL_CHAT_TEMPLATE,
        ),
    ]
}

pub fn default_by_id(id: &str) -> Option<PromptTemplate> {
    default_prompts().into_iter().find(|p| p.id == id)
}

const INTENT_ANALYSIS_TEMPLATE: &str = r#"You are the shopping assistant of a construction goods store.
Analyze the customer's message and extract their purchase intent.

Available categories:
{{categories}}

Conversation so far:
{{history}}

Customer message: "{{query}}"

Respond with a JSON object with exactly these fields:
- "categoryId": id of the best matching category, or null
- "subcategoryId": id of the best matching subcategory, or null
- "requirements": array of concrete requirement strings mentioned by the customer
- "budget": object {"min": number or null, "max": number or null}
- "preferences": array of softer preference strings (brand, style, quality level)
- "useCase": short free-text description of what the customer wants to accomplish
- "confidence": number between 0 and 1
- "isGeneralChat": true ONLY if the message is a pure greeting or small talk with no shopping intent
- "unavailableItem": null, or an object {"name": string, "probableCategory": string or null, "maxBudget": number or null, "specifications": array of strings} when the customer asks for a product that does not plausibly belong to any category above. Do not force a category match for such requests.

Answer in JSON only."#;

const PRODUCT_RANKING_TEMPLATE: &str = r#"You are the shopping assistant of a construction goods store.
The customer asked: "{{query}}"

Extracted intent:
{{intent}}

Candidate products:
{{candidates}}

Pick the products that genuinely fit the request (you may drop weak candidates) and respond with a JSON object:
- "recommendations": array of objects, best match first, each with:
  - "productId": id copied verbatim from the candidate list
  - "score": integer 0-100 for how well it matches
  - "highlights": array of 2-4 short strings naming the selling points that matter for this request
  - "reason": one or two persuasive sentences for this customer
- "summary": one short paragraph addressed to the customer, in the same language as their message, referencing the best options

Answer in JSON only."#;

const MISSING_ITEM_TEMPLATE: &str = r#"You are the shopping assistant of a construction goods store.
The customer wants something we apparently do not stock.

Customer message: "{{query}}"

Extracted intent:
{{intent}}

Conversation so far:
{{history}}

Decide between two actions and respond with a JSON object:
- If the conversation already contains enough detail (explicit budget or specifications, or clear purchase intent), use:
  {"action": "request", "name": string, "probableCategory": string or null, "maxBudget": number, "specifications": array of strings, "message": short confirmation telling the customer we logged their request}
- Otherwise use:
  {"action": "ask_details", "message": one friendly clarifying question about the missing detail (budget, size, brand...)}

The "message" must be in the same language as the customer's message. Answer in JSON only."#;

const GENERAL_CHAT_TEMPLATE: &str = r#"{{system_prompt}}

Your name is {{persona}}. You are the friendly shopping assistant of a construction goods store. Keep the reply short, warm and in the same language as the customer. If it fits naturally, invite them to tell you what they are building or shopping for.

Conversation so far:
{{history}}

Customer message: "{{query}}"

Reply with plain text only."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_covers_all_ids() {
        for id in [INTENT_ANALYSIS, PRODUCT_RANKING, MISSING_ITEM, GENERAL_CHAT] {
            let tpl = default_by_id(id).unwrap();
            assert!(tpl.active);
            assert!(!tpl.template.is_empty());
        }
        assert!(default_by_id("nope").is_none());
    }

    #[test]
    fn templates_declare_their_placeholders() {
        let t = default_by_id(INTENT_ANALYSIS).unwrap();
        for var in ["{{categories}}", "{{history}}", "{{query}}"] {
            assert!(t.template.contains(var), "missing {var}");
        }
        let t = default_by_id(PRODUCT_RANKING).unwrap();
        for var in ["{{query}}", "{{intent}}", "{{candidates}}"] {
            assert!(t.template.contains(var), "missing {var}");
        }
    }
}
