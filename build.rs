fn main() {
    // Only the firmware build needs the ESP-IDF environment exported.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
