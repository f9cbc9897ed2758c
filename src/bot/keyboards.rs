//! Reply keyboards and message texts.

use chrono::{DateTime, Utc};

use super::{
    api::ProductPage,
    telegram::{InlineKeyboardButton, KeyboardButton, ReplyMarkup},
};
use crate::{
    dto::{cart::CartList, auth::Profile, orders::{OrderSummary, OrderWithItems}},
    models::Product,
};

pub const CATALOG: &str = "Catalog";
pub const LOGIN: &str = "Log in";
pub const PROFILE: &str = "Profile";
pub const MY_CART: &str = "My cart";
pub const MY_ORDERS: &str = "My orders";
pub const LOGOUT: &str = "Log out";
pub const MAIN_MENU: &str = "Main menu";
pub const BACK_TO_CATALOG: &str = "Back to catalog";
pub const BACK_TO_PRODUCTS: &str = "Back to products";
pub const BACK_TO_PROFILE: &str = "Back to profile";
pub const SELECT_PREFIX: &str = "Select: ";
pub const ORDER_PREFIX: &str = "Order #";

/// Display name and slug of every catalog category.
pub const CATEGORIES: [(&str, &str); 6] = [
    ("All products", "all"),
    ("Kitchen", "kuhnya"),
    ("Bedroom", "spalnya"),
    ("Living room", "gostinnaya"),
    ("Office", "ofis"),
    ("Decor", "dekor"),
];

const DESCRIPTION_PREVIEW: usize = 50;
const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

fn button(text: impl Into<String>) -> KeyboardButton {
    KeyboardButton { text: text.into() }
}

fn rows(buttons: Vec<KeyboardButton>, row_width: usize) -> Vec<Vec<KeyboardButton>> {
    buttons.chunks(row_width).map(<[_]>::to_vec).collect()
}

fn keyboard(rows: Vec<Vec<KeyboardButton>>) -> ReplyMarkup {
    ReplyMarkup::Keyboard {
        keyboard: rows,
        resize_keyboard: true,
    }
}

pub fn main_keyboard(logged_in: bool) -> ReplyMarkup {
    let account = if logged_in { PROFILE } else { LOGIN };
    keyboard(vec![vec![button(CATALOG)], vec![button(account)]])
}

pub fn categories_keyboard() -> ReplyMarkup {
    let buttons = CATEGORIES.iter().map(|(name, _)| button(*name)).collect();
    let mut rows = rows(buttons, 2);
    rows.push(vec![button(MAIN_MENU)]);
    keyboard(rows)
}

pub fn category_slug(name: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(label, _)| *label == name)
        .map(|(_, slug)| *slug)
}

pub fn page_callback(slug: &str, page: i64) -> String {
    format!("page_{slug}_{page}")
}

/// Inverse of [`page_callback`]; slugs may themselves contain `_`.
pub fn parse_page_callback(data: &str) -> Option<(&str, i64)> {
    let rest = data.strip_prefix("page_")?;
    let (slug, page) = rest.rsplit_once('_')?;
    let page = page.parse().ok().filter(|p| *p >= 1)?;
    (!slug.is_empty()).then_some((slug, page))
}

/// Previous/next buttons; `None` when the listing fits one page.
pub fn pagination_keyboard(listing: &ProductPage, slug: &str, page: i64) -> Option<ReplyMarkup> {
    let mut row = Vec::new();
    if listing.has_previous {
        row.push(InlineKeyboardButton {
            text: "◀️ Back".into(),
            callback_data: page_callback(slug, page - 1),
        });
    }
    if listing.has_next {
        row.push(InlineKeyboardButton {
            text: "Next ▶️".into(),
            callback_data: page_callback(slug, page + 1),
        });
    }
    (!row.is_empty()).then(|| ReplyMarkup::Inline {
        inline_keyboard: vec![row],
    })
}

fn preview(text: &str) -> String {
    let cut: String = text.chars().take(DESCRIPTION_PREVIEW).collect();
    format!("{cut}...")
}

pub fn products_text(products: &[Product], page: i64) -> String {
    let mut text = format!("Products in category (page {page}):\n\n");
    for product in products {
        text.push_str(&format!(
            "{}\nPrice: {} $\nDescription: {}\n\n",
            product.name,
            product.display_price(),
            preview(product.description.as_deref().unwrap_or_default()),
        ));
    }
    text
}

pub fn products_keyboard(products: &[Product]) -> ReplyMarkup {
    let mut buttons: Vec<_> = products
        .iter()
        .map(|p| button(format!("{SELECT_PREFIX}{}", p.name)))
        .collect();
    buttons.push(button(BACK_TO_CATALOG));
    keyboard(rows(buttons, 1))
}

pub fn back_to_products_keyboard() -> ReplyMarkup {
    keyboard(vec![vec![button(BACK_TO_PRODUCTS)]])
}

pub fn profile_keyboard() -> ReplyMarkup {
    keyboard(vec![
        vec![button(MY_CART), button(MY_ORDERS)],
        vec![button(LOGOUT), button(MAIN_MENU)],
    ])
}

pub fn orders_keyboard(orders: &[OrderSummary]) -> ReplyMarkup {
    let mut buttons: Vec<_> = orders
        .iter()
        .map(|o| button(format!("{ORDER_PREFIX}{}", o.id)))
        .collect();
    buttons.push(button(BACK_TO_PROFILE));
    buttons.push(button(MAIN_MENU));
    keyboard(rows(buttons, 1))
}

pub fn back_keyboard() -> ReplyMarkup {
    keyboard(vec![vec![button(BACK_TO_PROFILE)], vec![button(MAIN_MENU)]])
}

pub fn product_caption(product: &Product) -> String {
    format!(
        "{}\nPrice: {} $\nDescription: {}",
        product.name,
        product.display_price(),
        product.description.as_deref().unwrap_or_default(),
    )
}

pub fn profile_text(profile: &Profile) -> String {
    format!(
        "👤 Profile:\n━━━━━━━━━━━━━━━━━━━\n👩‍💼 Username: {}\n📧 Email: {}\n🧑 First name: {}\n👪 Last name: {}",
        profile.username, profile.email, profile.first_name, profile.last_name
    )
}

pub fn cart_text(cart: &CartList) -> String {
    let mut text = String::from("🛒 Your cart:\n\n");
    for item in &cart.items {
        text.push_str(&format!(
            "🛍 Product: {}\n  Quantity: {} x {} $ = {} $\n\n",
            item.product.name,
            item.quantity,
            item.product.display_price(),
            item.total_price,
        ));
    }
    text.push_str(&format!(
        "➡️ Total: {} item(s) for {} $",
        cart.total_quantity, cart.total_amount
    ));
    text
}

fn format_date(at: &DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

fn payment_method(payment_on_get: bool) -> &'static str {
    if payment_on_get { "On delivery" } else { "Online" }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

pub fn orders_text(orders: &[OrderSummary]) -> String {
    let mut text = format!("📋 Last {} orders:\n\n", orders.len());
    for order in orders {
        text.push_str(&format!(
            "📦 Order #{}\n📅 Created: {}\n✅ Status: {}\n💳 Payment: {}\n💲 Total: {} $\n\n",
            order.id,
            format_date(&order.created_at),
            order.status,
            payment_method(order.payment_on_get),
            order.total_amount,
        ));
    }
    text
}

pub fn order_detail_text(detail: &OrderWithItems) -> String {
    let order = &detail.order;
    let mut text = format!(
        "📦 Order #{} details:\n━━━━━━━━━━━━━━━━━━━\n📅 Created: {}\n🚚 Delivery: {}\n🏠 Address: {}\n💳 Payment: {}\n✅ Paid: {}\n📋 Status: {}\n💲 Total: {} $\n\n🛍 Items:\n",
        order.id,
        format_date(&order.created_at),
        yes_no(order.requires_delivery),
        order.delivery_address.as_deref().unwrap_or("Not specified"),
        payment_method(order.payment_on_get),
        yes_no(order.is_paid),
        order.status,
        order.total_amount,
    );
    for item in &detail.items {
        text.push_str(&format!(
            "- {}\n  {} x {} $ = {} $\n\n",
            item.name, item.quantity, item.price, item.total_price
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(name: &str, discount: rust_decimal::Decimal) -> Product {
        Product {
            id: 1,
            name: name.into(),
            slug: name.to_lowercase(),
            description: Some("A".repeat(80)),
            image: None,
            price: dec!(100.00),
            discount,
            sell_price: crate::pricing::effective_unit_price(dec!(100.00), discount),
            stock: 3,
            category_id: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn page_callback_parses_back() {
        assert_eq!(parse_page_callback("page_ofis_2"), Some(("ofis", 2)));
        assert_eq!(parse_page_callback("page_home_decor_3"), Some(("home_decor", 3)));
        assert_eq!(parse_page_callback(&page_callback("all", 1)), Some(("all", 1)));
        assert_eq!(parse_page_callback("page_ofis_x"), None);
        assert_eq!(parse_page_callback("page_ofis_0"), None);
        assert_eq!(parse_page_callback("other"), None);
    }

    #[test]
    fn pagination_buttons_follow_listing() {
        let mut listing = ProductPage::default();
        assert!(pagination_keyboard(&listing, "all", 1).is_none());

        listing.has_previous = true;
        listing.has_next = true;
        let Some(ReplyMarkup::Inline { inline_keyboard }) = pagination_keyboard(&listing, "all", 2)
        else {
            panic!("expected inline keyboard");
        };
        let data: Vec<_> = inline_keyboard[0].iter().map(|b| b.callback_data.as_str()).collect();
        assert_eq!(data, ["page_all_1", "page_all_3"]);
    }

    #[test]
    fn main_keyboard_offers_login_or_profile() {
        let ReplyMarkup::Keyboard { keyboard, .. } = main_keyboard(false) else {
            panic!("expected reply keyboard");
        };
        assert_eq!(keyboard[1][0].text, LOGIN);

        let ReplyMarkup::Keyboard { keyboard, .. } = main_keyboard(true) else {
            panic!("expected reply keyboard");
        };
        assert_eq!(keyboard[1][0].text, PROFILE);
    }

    #[test]
    fn product_listing_shows_discounted_price_and_preview() {
        let text = products_text(&[product("Chair", dec!(20))], 1);
        assert!(text.contains("Price: 80.00 $"));
        assert!(text.contains(&format!("{}...", "A".repeat(50))));
        assert!(!text.contains(&"A".repeat(51)));
    }

    #[test]
    fn category_names_map_to_slugs() {
        assert_eq!(category_slug("Office"), Some("ofis"));
        assert_eq!(category_slug("Garage"), None);
    }
}
