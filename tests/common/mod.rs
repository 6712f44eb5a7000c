//! Shared fixtures for the integration suite.

use std::fs;
use std::path::{Path, PathBuf};

/// Write a file under the project root, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// A small mixed-language project exercising every default parser.
pub fn build_sample_project(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    files.push(write_file(
        root,
        "services/orders.py",
        r#""""Order processing service."""

import helpers

TAX_RATE = 0.2

def total(order):
    """Compute the order total including tax."""
    subtotal = sum_lines(order)
    return apply_tax(subtotal)

def sum_lines(order):
    return sum(line.price for line in order.lines)

def apply_tax(amount):
    return amount * (1 + TAX_RATE)

class OrderBook:
    """Holds open orders."""

    def __init__(self):
        self.orders = []

    def create_order(self, order):
        self.orders.append(order)
"#,
    ));

    files.push(write_file(root, "helpers.py", "def shared():\n    return 1\n"));

    files.push(write_file(
        root,
        "web/cart.js",
        r#"import { render } from "./view";

const MAX_ITEMS = 50;

function addItem(cart, item) {
  if (cart.length >= MAX_ITEMS) {
    throw new CartFullError("cart full");
  }
  cart.push(item);
  render(cart);
}

class CartFullError extends Error {}
"#,
    ));
    files.push(write_file(root, "web/view.js", "export function render(cart) {}\n"));

    files.push(write_file(
        root,
        "package.json",
        r#"{ "name": "shop", "dependencies": { "react": "^18", "left-pad": "1.3" } }"#,
    ));

    files.push(write_file(
        root,
        "docs/guide.md",
        "# Shop Guide\n\nHow the shop works, in detail for newcomers.\n\n## Checkout\n\nCheckout flow notes and edge cases worth knowing about.\n",
    ));

    files
}
