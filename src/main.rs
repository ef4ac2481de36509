fn main() {
    scan_inventory_lib::run()
}
