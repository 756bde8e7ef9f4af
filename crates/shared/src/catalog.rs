use crate::domain::{Product, ProductId};

pub fn default_catalog() -> Vec<Product> {
    vec![
        Product {
            id: ProductId("webnd-merch".into()),
            name: "WebnD Merch".into(),
            description: "The official Web and Design Society tee, printed with your name.".into(),
            price: 399,
            image: "/ver2webnd.png".into(),
            size_chart: "/size-chart-webnd.pdf".into(),
        },
        Product {
            id: ProductId("code-merch".into()),
            name: "Code Merch".into(),
            description: "For the ones who ship at 3am.".into(),
            price: 349,
            image: "/code-merch.png".into(),
            size_chart: "/size-chart-code.pdf".into(),
        },
    ]
}

/// Finds a product by id. Unknown ids fall back to the first listed product.
pub fn find_product<'a>(catalog: &'a [Product], product_id: &str) -> Option<&'a Product> {
    catalog
        .iter()
        .find(|product| product.id.as_str() == product_id)
        .or_else(|| catalog.first())
}
