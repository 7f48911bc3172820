//! Prompt text for each remote operation.

use studio_contracts::{Audience, Category, KeywordSet, Locale};

const CREATIVE_DIRECTOR_EN: &str = "You are a visionary Fashion Creative Director. Your job is to build a precise Production Plan.
You MUST guide the user to decide on EACH of these specific categories:
1. **Vibe & Mood** (e.g., Retro-skater, Minimalist, Editorial, High-Fashion).
2. **Location & Background** (Specific details).
3. **Lighting** (e.g., Golden hour, Studio softbox, Neon, Harsh Flash).
4. **Model Look** (Hairstyle, Makeup, Styling).
5. **Accessories List** (MUST be detailed, e.g., 'Silver chunky chain', 'Black beanie', 'Leather wristband').
6. **Pose & Composition** (e.g., Low angle, Wide shot, Dynamic movement).
7. **Camera Specifications** (Lens mm, Film stock, Camera type - e.g., 'Shot on Sony A7R IV, 35mm lens, Kodak Portra 400 grain').";

const CREATIVE_DIRECTOR_MM: &str = "သင်သည် တိကျပြတ်သားသော ဖက်ရှင်ဖန်တီးမှု ဒါရိုက်တာ (Creative Director) တစ်ဦးဖြစ်သည်။
ဓာတ်ပုံရိုက်ကူးမှုအတွက် အောက်ပါအချက်များကို တစ်ခုချင်းစီ မဖြစ်မနေ ဆွေးနွေးဆုံးဖြတ်ပါ။
၁။ **Vibe & Mood** (ဥပမာ - Retro-skater၊ ခေတ်ဆန်သောပုံစံ၊ Editorial)။
၂။ **ရိုက်ကွင်းနေရာ (Location)**။
၃။ **အလင်းအမှောင် (Lighting)**။
၄။ **ဆံပင်နှင့် မိတ်ကပ် (Hair & Look)**။
၅။ **အသုံးအဆောင်များ (Accessories List)** (အလွန်တိကျရမည်။ ဥပမာ - နာရီ၊ ဆွဲကြိုး၊ မျက်မှန်)။
၆။ **ပို့စ်နှင့် ဖွဲ့စည်းပုံ (Pose & Composition)**။
၇။ **ကင်မရာ အသေးစိတ်** (Camera type, Lens mm, Film style - ဥပမာ - 35mm lens, vintage film grain)။";

pub const MAIN_SUBJECT_LABEL: &str = "MAIN SUBJECT CLOTHING (Must wear this):";

pub fn creative_director(locale: Locale) -> &'static str {
    match locale {
        Locale::En => CREATIVE_DIRECTOR_EN,
        Locale::Mm => CREATIVE_DIRECTOR_MM,
    }
}

pub fn analyze_garment(locale: Locale, audience: Audience) -> String {
    match locale {
        Locale::En => format!(
            "Analyze this garment (Target Audience: {}) and suggest a creative direction for a photoshoot.",
            audience.as_str()
        ),
        Locale::Mm => {
            let audience_text = match audience {
                Audience::Male => "အမျိုးသား",
                Audience::Female => "အမျိုးသမီး",
                Audience::Unisex => "ကျား/မ မရွေး",
            };
            format!("ဤအဝတ်အစား({audience_text} ဝတ်)ကို ကြည့်ရှုပြီး ဓာတ်ပုံရိုက်ကူးရန် အကြံဉာဏ်များပေးပါ။")
        }
    }
}

/// Chat persona; replies follow the locale's language.
pub fn producer(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Respond in English. You are a fashion producer.",
        Locale::Mm => "Respond in Burmese. You are a fashion producer.",
    }
}

pub fn keyword_set(context: &str) -> String {
    let categories = Category::ALL
        .iter()
        .enumerate()
        .map(|(index, category)| format!("{}. {}", index + 1, category.label()))
        .collect::<Vec<String>>()
        .join(", ");
    format!(
        "Based on the following conversation about a fashion shoot, generate a highly specific Pinterest search query (English) for EACH of the following 8 categories.\n\n\
         Categories: {categories}.\n\n\
         Conversation:\n{context}\n\n\
         Return ONLY a JSON array of 8 strings."
    )
}

pub fn regenerate_keyword(context: &str, category: Category, current: &str) -> String {
    format!(
        "Generate a NEW alternative Pinterest keyword for \"{}\" based on this context: {context}. Current: {current}. Return string only.",
        category.label()
    )
}

pub fn summarize(context: &str, locale: Locale) -> String {
    let task = match locale {
        Locale::En => "Summarize ONLY the final confirmed decisions for Vibe, Location, Model, Styling, etc.",
        Locale::Mm => "အတည်ပြုပြီးသော အချက်လက်များကိုသာ စာရင်းပြုစုပေးပါ။",
    };
    format!("Conversation History:\n{context}\n\nTask: {task}")
}

pub fn master_prompt(context: &str, accessories: &str, keywords: Option<&KeywordSet>) -> String {
    let mut prompt = format!(
        "Generate a Master Prompt for this shoot: Subject details, Outfit styling, Setting/Background, and Vibe/Camera style. Context: {context}. Accessories: {accessories}."
    );
    if let Some(keywords) = keywords {
        prompt.push_str(" Style keywords: ");
        prompt.push_str(&keyword_list(keywords));
        prompt.push('.');
    }
    prompt
}

pub fn reference_label(category: Category) -> String {
    format!("Ref: {}", category.label())
}

pub fn editorial(context: &str, accessories: &str) -> String {
    format!(
        "Generate a photorealistic fashion editorial. Style: {context}. Accessories: {accessories}."
    )
}

fn keyword_list(keywords: &KeywordSet) -> String {
    keywords
        .iter()
        .map(|(category, value)| format!("{}: {value}", category.label()))
        .collect::<Vec<String>>()
        .join("; ")
}
