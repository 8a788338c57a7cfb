//! Demo catalog and member fixtures.

use crate::model::book::NewBook;
use crate::model::member::NewMember;

/// Titles registered by a fresh demo library, in this order.
const SAMPLE_BOOKS: &[(&str, &str, &str, u32)] = &[
    ("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 5),
    ("Clean Code", "Robert C. Martin", "Tech", 3),
    ("Data Structures", "Robert Lafore", "Education", 2),
    ("To Kill a Mockingbird", "Harper Lee", "Fiction", 4),
    ("The Pragmatic Programmer", "Andrew Hunt", "Tech", 2),
    ("Introduction to Algorithms", "Thomas H. Cormen", "Education", 3),
    ("Sapiens", "Yuval Noah Harari", "History", 2),
    ("A Brief History of Time", "Stephen Hawking", "Science", 1),
];

const SAMPLE_MEMBERS: &[(&str, &str, &str)] = &[
    ("Aarav Sharma", "aarav.sharma@example.com", "9876543210"),
    ("Diya Patel", "diya.patel@example.com", "9123456780"),
    ("Kabir Singh", "kabir.singh@example.com", "8765432109"),
    ("Meera Iyer", "meera.iyer@example.com", "7654321098"),
    ("Rohan Gupta", "rohan.gupta@example.com", "6543210987"),
];

pub fn sample_books() -> Vec<NewBook> {
    SAMPLE_BOOKS
        .iter()
        .map(|(title, author, category, copies)| NewBook::new(*title, *author, *category, *copies))
        .collect()
}

pub fn sample_members() -> Vec<NewMember> {
    SAMPLE_MEMBERS
        .iter()
        .map(|(name, email, phone)| NewMember::new(*name, *email, *phone))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{sample_books, sample_members};

    #[test]
    fn fixtures_pass_validation() {
        for book in sample_books() {
            book.normalized().expect("sample book must be valid");
        }
        for member in sample_members() {
            member.normalized().expect("sample member must be valid");
        }
    }
}
